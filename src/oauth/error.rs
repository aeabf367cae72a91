//! # Facade error taxonomy
//!
//! Every failure inside the credential service facade is converted to
//! exactly one status-tagged error before a response is sent; nothing else
//! crosses the handler boundary. Internal failures are logged with full
//! detail server-side and surfaced to callers as a generic message.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oauth::client::OAuthClientError;
use crate::oauth::store::OAuthStoreError;

/// Status-tagged error taxonomy of the credential service facade.
#[derive(Debug, Error)]
pub enum OAuthServiceError {
    /// Malformed request: bad JSON, invalid URLs, missing fields
    #[error("{message}")]
    BadRequest { message: String },

    /// Unknown provider or credential
    #[error("{message}")]
    NotFound { message: String },

    /// The provider's token endpoint answered with a non-200 status; the
    /// provider's status code is mirrored to the caller
    #[error("token endpoint returned {status}: {detail}")]
    Upstream { status: u16, detail: String },

    /// Local failure: I/O to the token endpoint, secure-store access, or a
    /// 200 response that could not be understood
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl OAuthServiceError {
    /// Create a bad-request error
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
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

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OAuthStoreError> for OAuthServiceError {
    fn from(err: OAuthStoreError) -> Self {
        match err {
            OAuthStoreError::NoStoredCredentials(provider) => Self::bad_request(format!(
                "no stored client credentials to reuse for provider '{provider}'"
            )),
            OAuthStoreError::Store(_) | OAuthStoreError::Corrupt { .. } => {
                Self::internal_with_source("OAuth store access failed", err)
            }
        }
    }
}

impl From<OAuthClientError> for OAuthServiceError {
    fn from(err: OAuthClientError) -> Self {
        match err {
            OAuthClientError::Upstream { status, detail } => Self::Upstream { status, detail },
            OAuthClientError::Transport { .. } => {
                Self::internal_with_source("error while reaching token endpoint", err)
            }
            OAuthClientError::InvalidResponse { .. }
            | OAuthClientError::MissingTokenField(_)
            | OAuthClientError::MissingClientCredentials(_) => {
                Self::internal_with_source("token endpoint response was unusable", err)
            }
        }
    }
}

/// Error detail in the response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Standard JSON error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for OAuthServiceError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            Self::BadRequest { message } => ("BAD_REQUEST", message.clone()),
            Self::NotFound { message } => ("NOT_FOUND", message.clone()),
            Self::Upstream { .. } => ("UPSTREAM_ERROR", self.to_string()),
            Self::Internal { message, source } => {
                // Full detail stays server-side.
                tracing::error!(error = %message, source = ?source, "internal error in OAuth facade");
                ("INTERNAL_ERROR", "Internal error".to_string())
            }
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message,
            },
            timestamp: Utc::now(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
