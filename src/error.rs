//! Error handling for the content handlers
//!
//! Provides centralized error types using thiserror. Every fatal path in the
//! handlers maps to one of these variants before being surfaced as exit code 1.

use crate::events::EngineErrorCode;
use thiserror::Error;

/// Main error type for the content handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// IO errors (registry migration, catalog existence checks)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request URI errors (scheme, path shape, linkid)
    #[error("URI error: {0}")]
    Uri(String),

    /// Catalog resolution errors (no candidate matched the host token)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Asynchronous errors reported by the catalog/search/install engine
    #[error("Engine error {code}: {message}")]
    Engine {
        code: EngineErrorCode,
        message: String,
        metadata: serde_json::Value,
    },

    /// Engine bridge process errors (spawn, pipe, protocol)
    #[error("Bridge error: {0}")]
    Bridge(String),
}

/// Result type alias for handler operations
pub type Result<T> = std::result::Result<T, HandlerError>;

// Convenient error constructors
impl HandlerError {
    /// Create a URI error
    pub fn uri(msg: impl Into<String>) -> Self {
        Self::Uri(msg.into())
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a bridge error
    pub fn bridge(msg: impl Into<String>) -> Self {
        Self::Bridge(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HandlerError::catalog("no config found for sddmtheme.knsrc");
        assert_eq!(
            err.to_string(),
            "Catalog error: no config found for sddmtheme.knsrc"
        );

        let err = HandlerError::uri("wrong format in the url path");
        assert_eq!(err.to_string(), "URI error: wrong format in the url path");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HandlerError = io_err.into();
        assert!(matches!(err, HandlerError::Io(_)));
    }

    #[test]
    fn test_engine_error_carries_code() {
        let err = HandlerError::Engine {
            code: EngineErrorCode::Network,
            message: "provider unreachable".into(),
            metadata: serde_json::Value::Null,
        };
        let msg = err.to_string();
        assert!(msg.contains("network"));
        assert!(msg.contains("provider unreachable"));
    }
}
