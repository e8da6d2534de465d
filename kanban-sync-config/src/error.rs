//! Error types for the kanban-sync configuration system

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration parsing failed
    #[error("Failed to parse configuration: {source}")]
    ParseError {
        path: Option<PathBuf>,
        #[source]
        source: Box<figment::Error>,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for key '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    /// Create a parse error, optionally attributed to a file
    pub fn parse_error(path: Option<PathBuf>, source: figment::Error) -> Self {
        Self::ParseError {
            path,
            source: Box::new(source),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::parse_error(None, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::invalid_value("gateway.timeout_secs", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for key 'gateway.timeout_secs': must be greater than zero"
        );
    }
}
