//! Configuration structures for ChRIS clients.
//!
//! [`ClientConfig`] controls the HTTP connection pool. [`ChrisConfig`] is the
//! serializable, validated configuration of a client instance.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Path every ChRIS API root URL must end with.
pub const API_ROOT_SUFFIX: &str = "/api/v1/";

/// Default maximum number of page requests made by a single search
pub const DEFAULT_MAX_SEARCH_REQUESTS: u32 = 100;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

const USER_AGENT: &str = concat!("chris-core/", env!("CARGO_PKG_VERSION"));

/// Maximum number of HTTP requests a search may make while paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MaxRequests {
    /// At most this many requests
    Limited(u32),
    /// No limit
    Unlimited,
}

impl MaxRequests {
    /// Returns true if no further request is allowed.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Limited(0))
    }

    /// The budget left after one more request.
    #[must_use]
    pub const fn decrement(self) -> Self {
        match self {
            Self::Limited(n) => Self::Limited(n.saturating_sub(1)),
            Self::Unlimited => Self::Unlimited,
        }
    }
}

impl Default for MaxRequests {
    fn default() -> Self {
        Self::Limited(DEFAULT_MAX_SEARCH_REQUESTS)
    }
}

/// Negative values mean unlimited, `-1` being the conventional sentinel.
impl From<i64> for MaxRequests {
    fn from(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Limited(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

impl From<MaxRequests> for i64 {
    fn from(value: MaxRequests) -> Self {
        match value {
            MaxRequests::Limited(n) => i64::from(n),
            MaxRequests::Unlimited => -1,
        }
    }
}

/// HTTP client configuration.
///
/// There is no retry policy: a failed request surfaces immediately.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// `User-Agent` header value
    pub user_agent: String,

    /// Enable response compression
    pub enable_compression: bool,

    /// Whether to verify TLS certificates
    pub tls_verify: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            user_agent: USER_AGENT.to_string(),
            enable_compression: true,
            tls_verify: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a ChRIS client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChrisConfig {
    /// API root URL, e.g. `https://cube.chrisproject.org/api/v1/`
    #[validate(url)]
    pub url: String,

    /// Maximum number of requests per search, `-1` for unlimited
    #[serde(default)]
    pub max_search_requests: MaxRequests,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT
}

const fn default_tls_verify() -> bool {
    true
}

impl ChrisConfig {
    /// Create a new configuration for the given API root URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            url: url.into(),
            max_search_requests: MaxRequests::default(),
            request_timeout_secs: default_request_timeout_secs(),
            tls_verify: default_tls_verify(),
        };
        config.check()?;
        Ok(config)
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or validation fails.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        self.parse_url().map(|_| ())
    }

    /// Set the pagination budget.
    #[must_use]
    pub const fn with_max_search_requests(mut self, max: MaxRequests) -> Self {
        self.max_search_requests = max;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Parse the API root URL, checking it ends with `/api/v1/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or has the wrong suffix.
    pub fn parse_url(&self) -> Result<Url, Error> {
        parse_api_url(&self.url)
    }

    /// HTTP configuration derived from this configuration.
    #[must_use]
    pub fn http_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_tls_verify(self.tls_verify)
    }
}

/// Parse a ChRIS API root URL.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] unless the URL parses and ends with `/api/v1/`.
pub fn parse_api_url(url: &str) -> Result<Url, Error> {
    if !url.ends_with(API_ROOT_SUFFIX) {
        return Err(Error::ConfigError(format!(
            "url must end with {API_ROOT_SUFFIX}, got {url}"
        )));
    }
    Url::parse(url).map_err(|e| Error::ConfigError(format!("Invalid API URL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_requests_from_sentinel() {
        assert_eq!(MaxRequests::from(-1), MaxRequests::Unlimited);
        assert_eq!(MaxRequests::from(5), MaxRequests::Limited(5));
        assert_eq!(i64::from(MaxRequests::Unlimited), -1);
        assert_eq!(MaxRequests::default(), MaxRequests::Limited(100));
    }

    #[test]
    fn test_max_requests_decrement() {
        let budget = MaxRequests::Limited(1);
        assert!(!budget.is_exhausted());
        assert!(budget.decrement().is_exhausted());
        assert_eq!(MaxRequests::Limited(0).decrement(), MaxRequests::Limited(0));
        assert!(!MaxRequests::Unlimited.decrement().is_exhausted());
    }

    #[test]
    fn test_parse_api_url() {
        assert!(parse_api_url("https://cube.chrisproject.org/api/v1/").is_ok());
        assert!(matches!(
            parse_api_url("https://cube.chrisproject.org/api/v1"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            parse_api_url("https://cube.chrisproject.org/"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_chris_config_new() {
        let config = ChrisConfig::new("http://localhost:8000/api/v1/").unwrap();
        assert_eq!(config.max_search_requests, MaxRequests::Limited(100));
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.tls_verify);

        assert!(ChrisConfig::new("not a url").is_err());
        assert!(ChrisConfig::new("http://localhost:8000/").is_err());
    }

    #[test]
    fn test_chris_config_from_json() {
        let config = ChrisConfig::from_json(
            r#"{"url": "http://localhost:8000/api/v1/", "max_search_requests": -1}"#,
        )
        .unwrap();
        assert_eq!(config.max_search_requests, MaxRequests::Unlimited);

        let err = ChrisConfig::from_json(
            r#"{"url": "http://localhost:8000/api/v1/", "request_timeout_secs": 0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_http_config_from_chris_config() {
        let config = ChrisConfig::new("http://localhost:8000/api/v1/")
            .unwrap()
            .with_timeout(60)
            .with_tls_verify(false);
        let http = config.http_config();
        assert_eq!(http.timeout, Duration::from_secs(60));
        assert!(!http.tls_verify);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(5))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_user_agent("test-agent")
            .with_compression(false);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert_eq!(config.user_agent, "test-agent");
        assert!(!config.enable_compression);
    }
}
