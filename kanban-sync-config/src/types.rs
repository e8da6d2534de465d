//! Typed configuration values

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// Request timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote board store connection
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Suggestion agent used when the caller does not pick one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
}

impl SyncConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.validate()?;
        if let Some(agent) = &self.default_agent {
            if agent.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "default_agent",
                    "must not be blank when set",
                ));
            }
        }
        Ok(())
    }
}

/// Connection settings for the remote board store.
///
/// The bearer token lives here and is handed to the gateway constructor,
/// so every outgoing call carries it without any process-wide state.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API root, e.g. `https://boards.example.com/api/`
    pub base_url: String,
    /// Bearer token attached to every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Create a configuration pointing at the given API root
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Attach a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// The base URL with a guaranteed trailing slash, so relative paths join under it
    pub fn normalized_base_url(&self) -> String {
        let trimmed = self.base_url.trim();
        if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        }
    }

    /// Check that the values are usable
    pub fn validate(&self) -> ConfigResult<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::invalid_value(
                "gateway.base_url",
                "must not be empty",
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "gateway.base_url",
                format!("'{}' is not an http(s) URL", url),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "gateway.timeout_secs",
                "must be greater than zero",
            ));
        }
        if matches!(&self.token, Some(token) if token.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "gateway.token",
                "must not be blank when set",
            ));
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.gateway.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.gateway.token.is_none());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = GatewayConfig::new("  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gateway.base_url"));
    }

    #[test]
    fn test_non_http_base_url_rejected() {
        let config = GatewayConfig::new("ftp://boards.example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = GatewayConfig::default().with_timeout_secs(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_blank_agent_rejected() {
        let config = SyncConfig {
            default_agent: Some(" ".into()),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_base_url_adds_slash() {
        let config = GatewayConfig::new("https://boards.example.com/api");
        assert_eq!(
            config.normalized_base_url(),
            "https://boards.example.com/api/"
        );

        let already = GatewayConfig::new("https://boards.example.com/api/");
        assert_eq!(
            already.normalized_base_url(),
            "https://boards.example.com/api/"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GatewayConfig::default().with_token("secret-token");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
