//! # Error type definitions

use thiserror::Error;

/// Top-level application error type.
///
/// The OAuth facade carries its own status-tagged taxonomy
/// ([`crate::oauth::OAuthServiceError`]); this type covers everything
/// outside it: startup, configuration and server plumbing.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Network and server transport errors
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Server initialization errors
    #[error("server init error: {message}")]
    ServerInit {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO errors
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal errors without a more specific category
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatewayError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a server initialization error
    pub fn server_init<S: Into<String>>(message: S) -> Self {
        Self::ServerInit {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error carrying its cause
    pub fn internal_with_source<S: Into<String>, E: Into<anyhow::Error>>(
        message: S,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = GatewayError::config("missing bind address");
        assert!(matches!(err, GatewayError::Config { .. }));
        assert_eq!(err.to_string(), "config error: missing bind address");

        let err = GatewayError::network("connection refused");
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io { .. }));
    }
}
