//! token-gate
//!
//! Bearer-token verification and scope authorization for HTTP APIs, plus an
//! OAuth 2.0 authorization-code proxy in front of a remote identity provider.
//!
//! # Features
//!
//! - **Key Resolver**: lazily cached JWKS, one refetch per unknown `kid`
//! - **Token Validator**: RS256 signature, expiry, issuer whitelist, audience
//! - **Scope enforcement**: per-route requirements declared at registration
//! - **OAuth proxy**: authorize redirect, callback relay, confidential code exchange
//! - **Diagnostics**: `check-keys` and `inspect-token` subcommands

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod oauth;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?,
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(format!("Failed to install subscriber: {e}")))?,
    }

    Ok(())
}
