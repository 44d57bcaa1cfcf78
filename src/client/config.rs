//! Client configuration options.

use std::time::Duration;

/// Default API gateway host.
pub const DEFAULT_BASE_URL: &str = "https://api.gateway.equinor.com";

/// Configuration for the Omnia client.
///
/// # Example
///
/// ```
/// use omnia_rs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL requests are sent to
    pub base_url: String,
    /// Request timeout applied to every round trip
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Seconds before token expiry at which a refresh is triggered
    pub refresh_buffer_secs: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("omnia-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            refresh_buffer_secs: 0,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from environment variables.
    ///
    /// `OMNIA_BASE_URL` overrides the default gateway host; all other
    /// fields keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("OMNIA_BASE_URL") {
            config.base_url = base_url;
        }
        config
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the buffer time before token expiry at which to refresh.
    pub fn with_refresh_buffer(mut self, secs: i64) -> Self {
        self.refresh_buffer_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_buffer_secs, 0);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new()
            .with_base_url("http://localhost:8080")
            .with_refresh_buffer(30);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.refresh_buffer_secs, 30);
    }
}
