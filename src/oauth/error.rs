//! OAuth error responses (`{"error": .., "error_description": ..}`).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failures surfaced by the authorize, token and callback endpoints
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthError {
    /// Missing or invalid request parameter
    #[error("{0}")]
    InvalidRequest(String),

    /// `response_type` other than `code`
    #[error("{0}")]
    UnsupportedResponseType(String),

    /// `grant_type` other than `authorization_code`
    #[error("{0}")]
    UnsupportedGrantType(String),

    /// Deployment fault, e.g. credentials not configured
    #[error("{0}")]
    ServerConfig(String),

    /// Error reported by the provider on the callback
    #[error("{error}")]
    Provider {
        /// Provider's `error` code
        error: String,
        /// Provider's `error_description`
        description: Option<String>,
    },

    /// Provider unreachable or answered with something that is not JSON
    #[error("{0}")]
    ProviderUnavailable(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_description: Option<&'a str>,
}

impl OAuthError {
    /// Shorthand for [`OAuthError::InvalidRequest`]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidRequest(description.into())
    }

    /// Shorthand for [`OAuthError::ServerConfig`]
    pub fn server_config(description: impl Into<String>) -> Self {
        Self::ServerConfig(description.into())
    }

    /// The RFC 6749 `error` code
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::ServerConfig(_) => "server_error",
            Self::Provider { error, .. } => error,
            Self::ProviderUnavailable(_) => "temporarily_unavailable",
        }
    }

    /// Human-readable `error_description`
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest(d)
            | Self::UnsupportedResponseType(d)
            | Self::UnsupportedGrantType(d)
            | Self::ServerConfig(d)
            | Self::ProviderUnavailable(d) => Some(d),
            Self::Provider { description, .. } => description.as_deref(),
        }
    }

    /// HTTP status for this failure
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::UnsupportedResponseType(_)
            | Self::UnsupportedGrantType(_)
            | Self::Provider { .. } => StatusCode::BAD_REQUEST,
            Self::ServerConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error_code(),
            error_description: self.description(),
        };
        (self.status(), Json(body)).into_response()
    }
}
