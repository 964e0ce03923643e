//! Tap configuration
//!
//! Loaded from a JSON file (`--config`) or inline JSON (`--config-json`).
//! The raw document stays available to templates as `{{ config.* }}` and to
//! partition routers (`publisher_ids`).

use crate::auth::AuthConfig;
use crate::engine::{CheckpointPolicy, SyncConfig};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::DEFAULT_MAX_PAGES;
use crate::schema::parse_datetime;
use crate::types::JsonValue;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings the tap reads from its config document
#[derive(Clone, Deserialize)]
pub struct TapConfig {
    /// API token sent as a bearer token
    #[serde(default)]
    pub auth_token: String,

    /// Earliest record date to sync (`YYYY-MM-DD` or a date-time)
    #[serde(default)]
    pub start_date: Option<String>,

    /// Publishers to sync, one partition each
    #[serde(default)]
    pub publisher_ids: Vec<JsonValue>,

    /// User-Agent header override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// API root override
    #[serde(default)]
    pub api_url: Option<String>,

    /// Client-side request rate cap
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Page size for offset-paginated streams
    #[serde(default)]
    pub page_size: Option<u64>,

    /// Checkpoint after this many pages
    #[serde(default)]
    pub checkpoint_every_pages: Option<u64>,

    /// Checkpoint after this many records
    #[serde(default)]
    pub checkpoint_every_records: Option<u64>,

    /// Page cap per partition
    #[serde(default)]
    pub max_pages: Option<u64>,

    /// The whole document
    #[serde(skip)]
    raw: JsonValue,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    300
}

impl TapConfig {
    /// Parse and validate a config document
    pub fn from_value(raw: JsonValue) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::config("Config must be a JSON object"));
        }
        let mut config: Self = serde_json::from_value(raw.clone())
            .map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.raw = raw;
        config.validate()?;
        Ok(config)
    }

    /// Parse inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let raw = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        Self::from_value(raw)
    }

    /// Load a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(Error::missing_field("auth_token"));
        }
        self.start_date()?;

        for id in &self.publisher_ids {
            let usable = match id {
                JsonValue::String(s) => !s.trim().is_empty(),
                JsonValue::Number(_) => true,
                _ => false,
            };
            if !usable {
                return Err(Error::invalid_value(
                    "publisher_ids",
                    format!("unusable publisher id {id}"),
                ));
            }
        }

        if self.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "requests_per_second",
                "must be greater than zero",
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be greater than zero"));
        }
        if self.page_size == Some(0) {
            return Err(Error::invalid_value("page_size", "must be greater than zero"));
        }
        if self.max_pages == Some(0) {
            return Err(Error::invalid_value("max_pages", "must be greater than zero"));
        }
        Ok(())
    }

    /// The configured start date, if any
    pub fn start_date(&self) -> Result<Option<NaiveDate>> {
        match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_datetime(raw)
                .map(|dt| Some(dt.date_naive()))
                .ok_or_else(|| {
                    Error::invalid_value("start_date", format!("'{raw}' is not a date or date-time"))
                }),
        }
    }

    /// The raw document for templates and partition routers
    pub fn template_value(&self) -> &JsonValue {
        &self.raw
    }

    /// Credentials for every request
    pub fn auth(&self) -> AuthConfig {
        AuthConfig::bearer(self.auth_token.trim())
    }

    /// HTTP client settings rooted at `base_url`
    pub fn http_config(&self, base_url: &str) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.api_url.as_deref().unwrap_or(base_url))
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_attempts(self.max_attempts);

        builder = match self.requests_per_second {
            Some(rps) => builder.rate_limit(RateLimiterConfig::per_second(rps)),
            None => builder.no_rate_limit(),
        };

        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent);
        }

        builder.build()
    }

    /// Checkpoint cadence; unset values keep the defaults
    pub fn checkpoint_policy(&self) -> CheckpointPolicy {
        let default = CheckpointPolicy::default();
        CheckpointPolicy {
            every_pages: self.checkpoint_every_pages.unwrap_or(default.every_pages),
            every_records: self
                .checkpoint_every_records
                .unwrap_or(default.every_records),
        }
    }

    /// Engine settings derived from this config
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new()
            .with_checkpoint(self.checkpoint_policy())
            .with_max_pages(self.max_pages.unwrap_or(DEFAULT_MAX_PAGES))
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("auth_token", &"***")
            .field("start_date", &self.start_date)
            .field("publisher_ids", &self.publisher_ids)
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("requests_per_second", &self.requests_per_second)
            .field("max_attempts", &self.max_attempts)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
