//! HTTP client with retry and rate limiting
//!
//! Provides a robust HTTP client that handles:
//! - Automatic retries with configurable backoff and jitter
//! - Server-directed waits on 429 (`Retry-After`)
//! - Preemptive throttling from the caller's `RateBudget`
//! - JSON response body parsing
//! - Error classification for retry decisions

use super::budget::RateBudget;
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::{BackoffType, Method};
use chrono::Utc;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Randomize backoff delays by ±25%
    pub jitter: bool,
    /// Upper bound on any server-directed wait (`Retry-After`, quota reset)
    pub max_throttle_wait: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            jitter: true,
            max_throttle_wait: Duration::from_secs(300),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("tap-cj/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set total attempts per request
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Enable or disable backoff jitter
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = enabled;
        self
    }

    /// Cap server-directed waits
    pub fn max_throttle_wait(mut self, wait: Duration) -> Self {
        self.config.max_throttle_wait = wait;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// A fully formed request: method, URL, query, headers and optional JSON body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL or a path joined onto the client's base URL
    pub url: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body (JSON)
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a new request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a query parameter, replacing an earlier one with the same name
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful response with its parsed JSON body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body (`Null` for an empty body)
    pub body: Value,
    /// Attempts it took to get this response
    pub attempts: u32,
}

/// Outcome of a single attempt that may be retried
struct RetryableFailure {
    error: Error,
    delay: Duration,
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        if let Some(base) = &config.base_url {
            url::Url::parse(base)?;
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: Authenticator::default(),
            rate_limiter,
        })
    }

    /// Create a client with authentication
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.authenticator = Authenticator::new(auth_config);
        Ok(client)
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Execute a request, retrying transient failures.
    ///
    /// The budget is refreshed from the headers of every response, including
    /// the ones that get retried.
    pub async fn execute(&self, request: &ApiRequest, budget: &mut RateBudget) -> Result<ApiResponse> {
        let url = self.build_url(&request.url);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            if let Some(wait) = budget.throttle_delay(Utc::now()) {
                let wait = wait.min(self.config.max_throttle_wait);
                debug!(
                    remaining = ?budget.remaining,
                    wait_ms = wait.as_millis() as u64,
                    "Rate budget exhausted, waiting for window reset"
                );
                tokio::time::sleep(wait).await;
            }

            let failure = match self.build_request(&url, request).send().await {
                Ok(response) => {
                    let status = response.status();
                    budget.update_from_headers(response.headers(), Utc::now());

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let delay = match budget.retry_after {
                            Some(wait) => wait.min(self.config.max_throttle_wait),
                            None => self.backoff_delay(attempt - 1),
                        };
                        RetryableFailure {
                            error: Error::RateLimited {
                                retry_after_seconds: delay.as_secs(),
                            },
                            delay,
                        }
                    } else if status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        RetryableFailure {
                            error: Error::http_status(status.as_u16(), body),
                            delay: self.backoff_delay(attempt - 1),
                        }
                    } else if status.is_client_error() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::http_status(status.as_u16(), body));
                    } else {
                        let headers = response.headers().clone();
                        match response.text().await {
                            Ok(text) => {
                                let body = if text.trim().is_empty() {
                                    Value::Null
                                } else {
                                    serde_json::from_str(&text).map_err(|e| {
                                        Error::decode(format!(
                                            "Response from {url} is not valid JSON: {e}"
                                        ))
                                    })?
                                };
                                debug!(method = %request.method, url = %url, attempt, "Request succeeded");
                                return Ok(ApiResponse {
                                    status: status.as_u16(),
                                    headers,
                                    body,
                                    attempts: attempt,
                                });
                            }
                            // Body cut off mid-transfer
                            Err(e) => RetryableFailure {
                                error: Error::Http(e),
                                delay: self.backoff_delay(attempt - 1),
                            },
                        }
                    }
                }
                Err(e) if e.is_timeout() => RetryableFailure {
                    error: Error::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    },
                    delay: self.backoff_delay(attempt - 1),
                },
                // Connection failed or dropped before a response arrived
                Err(e) if e.is_connect() || e.is_request() || e.is_body() => RetryableFailure {
                    error: Error::Http(e),
                    delay: self.backoff_delay(attempt - 1),
                },
                Err(e) => return Err(Error::Http(e)),
            };

            if attempt >= max_attempts {
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last_error: failure.error.to_string(),
                });
            }

            warn!(
                url = %url,
                attempt,
                max_attempts,
                delay_ms = failure.delay.as_millis() as u64,
                "{}, retrying",
                failure.error
            );
            tokio::time::sleep(failure.delay).await;
        }
    }

    fn build_request(&self, url: &str, request: &ApiRequest) -> reqwest::RequestBuilder {
        let mut req = self.client.request(request.method.into(), url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }

        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        self.authenticator.apply(req)
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                if path.is_empty() {
                    base.to_string()
                } else {
                    format!("{base}/{path}")
                }
            }
            None => path.to_string(),
        }
    }

    /// Calculate the un-jittered backoff delay for a given retry (0-based)
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff.saturating_mul(retry + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(retry);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }

    fn backoff_delay(&self, retry: u32) -> Duration {
        let base = self.calculate_backoff(retry);
        if self.config.jitter {
            apply_jitter(base)
        } else {
            base
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("auth", self.authenticator.config())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Spread a delay uniformly over ±25%
pub(crate) fn apply_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..=1.25);
    delay.mul_f64(factor)
}
