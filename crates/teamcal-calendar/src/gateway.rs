//! Events API gateway.
//!
//! `EventGateway` is the seam the cache and facade talk to; `HttpEventGateway`
//! is the reqwest implementation used in production.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use teamcal_core::ApiConfig;
use tracing::instrument;

use crate::error::CalendarError;
use crate::types::{format_instant, ApiEvent, ApiEventList, EventPatch, Filter, NewEvent, SearchParams};

/// Request/response access to the remote events API.
#[async_trait]
pub trait EventGateway: Send + Sync {
    /// `GET /calendar/events`
    async fn list_events(&self, params: &SearchParams) -> Result<ApiEventList, CalendarError>;

    /// `POST /calendar/events`
    async fn create_event(&self, event: &NewEvent) -> Result<ApiEvent, CalendarError>;

    /// `PUT /calendar/events/{id}`
    async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<ApiEvent, CalendarError>;

    /// `DELETE /calendar/events/{id}`
    async fn delete_event(&self, id: &str) -> Result<(), CalendarError>;
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

pub struct HttpEventGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, CalendarError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn events_url(&self) -> String {
        format!("{}/calendar/events", self.base_url)
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(id))
    }

    /// Helper to map API responses and error bodies.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            serde_json::from_str(&text).map_err(|e| CalendarError::Decode(e.to_string()))
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> CalendarError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => CalendarError::Http {
                status,
                message: body.message,
                code: body.code,
            },
            Err(_) => CalendarError::Http {
                status,
                message: text,
                code: None,
            },
        }
    }
}

/// Build the listing query string for the given search params.
pub fn list_query(params: &SearchParams) -> Result<String, CalendarError> {
    let mut parts = Vec::new();

    if !params.query.is_empty() {
        parts.push(format!("q={}", urlencoding::encode(&params.query)));
    }
    if let Some(range) = &params.date_range {
        parts.push(format!("start={}", urlencoding::encode(&format_instant(range.start))));
        parts.push(format!("end={}", urlencoding::encode(&format_instant(range.end))));
    }

    let active: Vec<&Filter> = params.active_filters().collect();
    if !active.is_empty() {
        let json = serde_json::to_string(&active)
            .map_err(|e| CalendarError::InvalidEventData(e.to_string()))?;
        parts.push(format!("filters={}", urlencoding::encode(&json)));
    }

    parts.push(format!("sortBy={}", params.sort_by.as_str()));
    parts.push(format!("sortOrder={}", params.sort_order.as_str()));

    Ok(parts.join("&"))
}

#[async_trait]
impl EventGateway for HttpEventGateway {
    #[instrument(skip(self, params), level = "info")]
    async fn list_events(&self, params: &SearchParams) -> Result<ApiEventList, CalendarError> {
        let url = format!("{}?{}", self.events_url(), list_query(params)?);

        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self, event), fields(title = %event.title), level = "info")]
    async fn create_event(&self, event: &NewEvent) -> Result<ApiEvent, CalendarError> {
        let response = self
            .client
            .post(self.events_url())
            .json(event)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self, patch), level = "info")]
    async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<ApiEvent, CalendarError> {
        let response = self
            .client
            .put(self.event_url(id))
            .json(patch)
            .send()
            .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self), level = "info")]
    async fn delete_event(&self, id: &str) -> Result<(), CalendarError> {
        let response = self.client.delete(self.event_url(id)).send().await?;

        // Delete returns an empty body on success
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }
}
