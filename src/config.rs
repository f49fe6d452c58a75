//! Configuration for talking to the conversion service.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`] or loaded from the environment with
//! [`ClientConfig::from_env`]. [`ApiRoutes`] derives every endpoint URL from
//! the single configurable base route.

use crate::error::OratorError;
use crate::job::{JobId, SourceRef};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the service base URL.
pub const ENV_BASE_URL: &str = "API_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "ORATOR_POLL_INTERVAL_MS";
pub const ENV_MAX_ATTEMPTS: &str = "ORATOR_MAX_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "ORATOR_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Client configuration.
///
/// # Example
/// ```rust
/// use orator_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://tts.internal:8000")
///     .poll_interval_ms(2_000)
///     .max_attempts(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout_ceiling().as_secs(), 600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base route of the conversion service. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Delay between two status queries in milliseconds. Default: 5000.
    pub poll_interval_ms: u64,

    /// Total status queries (successful or not) before giving up. Default: 120.
    ///
    /// Together with the interval this is a fixed wall-clock ceiling:
    /// 120 × 5 s ≈ 10 minutes.
    pub max_attempts: u32,

    /// Per-request HTTP timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Largest accepted document in bytes. Default: 30 MiB.
    pub max_file_size_bytes: u64,

    /// Accepted file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,

    /// Accepted MIME types when the caller supplies one.
    pub allowed_content_types: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 5_000,
            max_attempts: 120,
            request_timeout_secs: 30,
            max_file_size_bytes: 30 * 1024 * 1024,
            allowed_extensions: vec!["pdf".into(), "epub".into()],
            allowed_content_types: vec!["application/pdf".into(), "application/epub+zip".into()],
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overridden by `API_BASE_URL`, `ORATOR_POLL_INTERVAL_MS`,
    /// `ORATOR_MAX_ATTEMPTS` and `ORATOR_REQUEST_TIMEOUT_SECS` when set.
    pub fn from_env() -> Result<Self, OratorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`] but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OratorError> {
        let mut builder = Self::builder();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            builder = builder.base_url(url);
        }
        if let Some(v) = lookup(ENV_POLL_INTERVAL_MS) {
            builder = builder.poll_interval_ms(parse_var(ENV_POLL_INTERVAL_MS, &v)?);
        }
        if let Some(v) = lookup(ENV_MAX_ATTEMPTS) {
            builder = builder.max_attempts(parse_var(ENV_MAX_ATTEMPTS, &v)?);
        }
        if let Some(v) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            builder = builder.request_timeout_secs(parse_var(ENV_REQUEST_TIMEOUT_SECS, &v)?);
        }
        builder.build()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Wall-clock equivalent of the attempt budget.
    pub fn timeout_ceiling(&self) -> Duration {
        self.poll_interval() * self.max_attempts
    }

    pub fn routes(&self) -> ApiRoutes {
        ApiRoutes::new(&self.base_url)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OratorError> {
    value
        .trim()
        .parse()
        .map_err(|_| OratorError::InvalidConfig(format!("{key}: cannot parse '{value}'")))
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_size_bytes = bytes;
        self
    }

    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.allowed_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, OratorError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(OratorError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.max_attempts == 0 {
            return Err(OratorError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.poll_interval_ms == 0 {
            return Err(OratorError::InvalidConfig(
                "poll_interval_ms must be ≥ 1".into(),
            ));
        }
        if c.allowed_extensions.is_empty() {
            return Err(OratorError::InvalidConfig(
                "at least one file extension must be allowed".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Endpoint URLs of the conversion service, derived from one base route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    base: String,
}

impl ApiRoutes {
    pub fn new(base: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn upload(&self) -> String {
        format!("{}/api/files", self.base)
    }

    /// Job creation; the source id travels as the `file_id` query parameter.
    pub fn create_job(&self) -> String {
        format!("{}/api/tasks", self.base)
    }

    pub fn job_status(&self, job: &JobId) -> String {
        format!("{}/api/tasks/{}", self.base, job)
    }

    pub fn audio(&self, source: &SourceRef) -> String {
        format!("{}/api/files/{}/audio", self.base, source)
    }

    pub fn segments(&self, source: &SourceRef) -> String {
        format!("{}/api/files/{}/segments", self.base, source)
    }

    pub fn document(&self, source: &SourceRef) -> String {
        format!("{}/api/files/{}/pdf", self.base, source)
    }
}
