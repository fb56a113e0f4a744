//! Calendar-specific error types.

use teamcal_core::{AppError, NetworkError, ReqwestErrorExt};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    /// No HTTP response was received.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.into_network_error())
    }
}

impl CalendarError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            code: None,
        }
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Reduce the error to the single string written into store state.
    ///
    /// Server messages are shown as-is; failures without a recognisable
    /// message fall back to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Http { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Http { status, .. } => format!("{} (HTTP {})", fallback, status),
            Self::Network(e) => e.user_message().to_string(),
            Self::InvalidEventData(msg) => format!("Invalid event: {}", msg),
            Self::Decode(_) => fallback.to_string(),
        }
    }
}

impl From<CalendarError> for AppError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::Network(n) => AppError::Network(n),
            CalendarError::Decode(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
            other => AppError::Service(other.to_string()),
        }
    }
}
