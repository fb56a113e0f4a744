use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// View names accepted by `calendar.default_view`.
pub const KNOWN_VIEWS: &[&str] = &["month", "week", "day", "agenda"];

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Events API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Read-through cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Calendar view defaults and context scope
    #[serde(default)]
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the events API (the `/calendar/events` routes hang off it)
    pub base_url: String,

    /// Request timeout in seconds, enforced by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a cached query result is trusted, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHoursConfig {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Team the calendar is scoped to, if any
    #[serde(default)]
    pub team_id: Option<String>,

    /// Project the calendar is scoped to, if any
    #[serde(default)]
    pub project_id: Option<String>,

    /// One of `month`, `week`, `day`, `agenda`
    #[serde(default = "default_view")]
    pub default_view: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_week_starts_on_monday")]
    pub week_starts_on_monday: bool,

    #[serde(default)]
    pub business_hours: BusinessHoursConfig,
}

fn default_view() -> String {
    "month".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_week_starts_on_monday() -> bool {
    true
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            team_id: None,
            project_id: None,
            default_view: default_view(),
            locale: default_locale(),
            week_starts_on_monday: default_week_starts_on_monday(),
            business_hours: BusinessHoursConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("teamcal");

        Self {
            config_dir,
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there on first use
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Timeout must be greater than 0");
        } else if self.api.timeout_secs > 600 {
            result.add_warning("api.timeout_secs", "Timeout is unusually long (>10 minutes)");
        }

        if self.cache.ttl_secs == 0 {
            result.add_warning("cache.ttl_secs", "Event cache disabled (0 seconds)");
        } else if self.cache.ttl_secs > 3600 {
            result.add_warning(
                "cache.ttl_secs",
                "Cached events may be served for more than an hour",
            );
        }

        if !KNOWN_VIEWS.contains(&self.calendar.default_view.as_str()) {
            result.add_error(
                "calendar.default_view",
                format!(
                    "Unknown view '{}', expected one of: {}",
                    self.calendar.default_view,
                    KNOWN_VIEWS.join(", ")
                ),
            );
        }

        if self.calendar.locale.trim().is_empty() {
            result.add_warning("calendar.locale", "Locale is empty, falling back to 'en'");
        }

        let hours = self.calendar.business_hours;
        if hours.start_hour > 23 || hours.end_hour > 24 {
            result.add_error(
                "calendar.business_hours",
                "Business hours must fall within a single day",
            );
        } else if hours.start_hour >= hours.end_hour {
            result.add_error(
                "calendar.business_hours",
                "Business hours must start before they end",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("teamcal");

        Ok(config_dir.join("config.toml"))
    }
}
