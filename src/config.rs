//! Client configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config
//! file. Environment variables (`PERPLEXITY_*`) override file values.
//!
//! # Example
//!
//! ```
//! use perplexity_stream::config::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_base_url("http://localhost:8080")
//!     .with_timeout(Duration::from_secs(10));
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::QueryMode;

pub const DEFAULT_BASE_URL: &str = "https://www.perplexity.ai";
pub const DEFAULT_QUERY_ENDPOINT: &str = "/api/pplx.generateStream";
pub const DEFAULT_THREADS_ENDPOINT: &str = "/rest/thread/list_ask_threads";
pub const DEFAULT_API_VERSION: &str = "2.18";

const CONFIG_DIR: &str = "perplexity-stream";
const CONFIG_FILE: &str = "config.json";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Token-bucket settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Bucket capacity
    pub requests_per_period: u32,
    /// Time for an empty bucket to refill completely
    pub period_seconds: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_period: 20,
            period_seconds: 60.0,
        }
    }
}

impl RateLimitConfig {
    /// Refill period. Non-finite or negative values become zero, which
    /// validation rejects.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.period_seconds).unwrap_or(Duration::ZERO)
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Locale and version parameters sent with every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub language: String,
    pub timezone: String,
    pub api_version: String,
    pub model_preference: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            timezone: "Europe/London".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model_preference: "pplx_pro".to_string(),
        }
    }
}

/// Everything a [`ProtocolClient`](crate::client::ProtocolClient) needs
/// besides the bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub query_endpoint: String,
    pub threads_endpoint: String,
    /// Timeout for standard queries
    pub timeout_secs: u64,
    /// Timeout for deep research queries
    pub deep_research_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub locale: LocaleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query_endpoint: DEFAULT_QUERY_ENDPOINT.to_string(),
            threads_endpoint: DEFAULT_THREADS_ENDPOINT.to_string(),
            timeout_secs: 60,
            deep_research_timeout_secs: 360,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            locale: LocaleConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL (scheme and host, no trailing path).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_query_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.query_endpoint = endpoint.into();
        self
    }

    pub fn with_threads_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.threads_endpoint = endpoint.into();
        self
    }

    /// Set the standard-mode timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Set the deep-research timeout.
    pub fn with_deep_research_timeout(mut self, timeout: Duration) -> Self {
        self.deep_research_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_locale(mut self, locale: LocaleConfig) -> Self {
        self.locale = locale;
        self
    }

    /// Full URL of the streaming query endpoint.
    pub fn query_url(&self) -> String {
        join_url(&self.base_url, &self.query_endpoint)
    }

    /// Full URL of the thread-list endpoint, including its version query.
    pub fn threads_url(&self) -> String {
        format!(
            "{}?version={}&source=default",
            join_url(&self.base_url, &self.threads_endpoint),
            self.locale.api_version
        )
    }

    /// Request timeout for `mode`.
    pub fn timeout_for(&self, mode: QueryMode) -> Duration {
        match mode {
            QueryMode::Standard => Duration::from_secs(self.timeout_secs),
            QueryMode::DeepResearch => Duration::from_secs(self.deep_research_timeout_secs),
        }
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "base_url must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if self.query_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("query_endpoint is empty".to_string()));
        }
        if self.threads_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("threads_endpoint is empty".to_string()));
        }
        if self.timeout_secs == 0 || self.deep_research_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.rate_limit.requests_per_period == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.requests_per_period must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.period().is_zero() {
            return Err(ConfigError::Invalid(
                "rate_limit.period_seconds must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Load the default config file if it exists, then apply environment
    /// overrides and validate.
    pub fn load_default() -> Result<Self, ConfigError> {
        let config = match default_config_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PERPLEXITY_*` environment overrides.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(url) = env_string("PERPLEXITY_BASE_URL") {
            self.base_url = url;
        }
        if let Some(endpoint) = env_string("PERPLEXITY_QUERY_ENDPOINT") {
            self.query_endpoint = endpoint;
        }
        if let Some(endpoint) = env_string("PERPLEXITY_THREADS_ENDPOINT") {
            self.threads_endpoint = endpoint;
        }
        if let Some(secs) = env_parse("PERPLEXITY_TIMEOUT_SECS")? {
            self.timeout_secs = secs;
        }
        if let Some(secs) = env_parse("PERPLEXITY_DEEP_RESEARCH_TIMEOUT_SECS")? {
            self.deep_research_timeout_secs = secs;
        }
        if let Some(raw) = env_string("PERPLEXITY_RATE_LIMITING_ENABLED") {
            self.rate_limit.enabled = parse_bool("PERPLEXITY_RATE_LIMITING_ENABLED", &raw)?;
        }
        if let Some(requests) = env_parse("PERPLEXITY_RATE_LIMITING_RPS")? {
            self.rate_limit.requests_per_period = requests;
        }
        if let Some(period) = env_parse("PERPLEXITY_RATE_LIMITING_PERIOD")? {
            self.rate_limit.period_seconds = period;
        }
        if let Some(attempts) = env_parse("PERPLEXITY_RETRY_ATTEMPTS")? {
            self.retry.max_attempts = attempts;
        }
        if let Some(language) = env_string("PERPLEXITY_LANGUAGE") {
            self.locale.language = language;
        }
        if let Some(timezone) = env_string("PERPLEXITY_TIMEZONE") {
            self.locale.timezone = timezone;
        }
        Ok(self)
    }
}

/// `~/.config/perplexity-stream/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join(CONFIG_DIR).join(CONFIG_FILE))
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw.to_string(),
        }),
    }
}
