//! # Client Error Types
//!
//! Error types for everything that touches the network, the cache or the
//! configuration file.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Upstream            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Config         │  │  Transport      │  │  UpstreamStatus         │ │
//! │  │  ConfigLoad     │  │  (DNS, TLS,     │  │  NotFound               │ │
//! │  │  ConfigSave     │  │   timeout)      │  │  Decode                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Public API methods collapse every variant to None / false after       │
//! │  emitting exactly one error-level log event.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use loyaltydog_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Every way an upstream operation can fail.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Settings are missing or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    /// Failed to save the config file.
    #[error("Failed to save config: {0}")]
    ConfigSave(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request never produced an HTTP response.
    ///
    /// Carries the synthetic body `Error: "<message>" - Code: <code>`.
    #[error("Transport failure: {0}")]
    Transport(String),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    /// The API answered with a status other than the one the operation needs.
    #[error("Upstream returned {actual} (expected {expected}): {body}")]
    UpstreamStatus {
        expected: u16,
        actual: u16,
        body: String,
    },

    /// The requested record does not exist (or the input was empty).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// The cache store failed. Lookups fall back to the API.
    #[error("Cache error: {0}")]
    Cache(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid url: {err}"))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSave(err.to_string())
    }
}

#[cfg(feature = "redis-cache")]
impl From<redis::RedisError> for ClientError {
    fn from(err: redis::RedisError) -> Self {
        ClientError::Cache(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if the record does not exist upstream.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound(_) => true,
            ClientError::UpstreamStatus { actual, .. } => *actual == 404,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::Config(_) | ClientError::ConfigLoad(_) | ClientError::ConfigSave(_)
        )
    }

    /// Returns true if the request never reached the API.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_categorisation() {
        let status = ClientError::UpstreamStatus {
            expected: 200,
            actual: 404,
            body: "{}".into(),
        };
        assert!(status.is_not_found());
        assert!(ClientError::NotFound("customer".into()).is_not_found());
        assert!(!ClientError::Transport("timeout".into()).is_not_found());
    }

    #[test]
    fn test_config_errors() {
        assert!(ClientError::Config("api_key is required".into()).is_config_error());
        assert!(ClientError::ConfigLoad("io".into()).is_config_error());
        assert!(!ClientError::Cache("down".into()).is_config_error());

        let err: ClientError = ValidationError::Required {
            field: "program_id".into(),
        }
        .into();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::UpstreamStatus {
            expected: 202,
            actual: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "Upstream returned 500 (expected 202): boom");
    }
}
