//! Error types for token-gate

use std::io;

use thiserror::Error;

/// Result type alias for token-gate
pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors (start-up, configuration, diagnostics).
///
/// Request-path failures have their own taxonomies in
/// [`crate::auth::AuthError`] and [`crate::oauth::OAuthError`]; they are
/// converted into HTTP responses and never bubble up to this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing-key set could not be fetched or decoded
    #[error("Key set error: {0}")]
    Jwks(#[from] crate::auth::JwksError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
