//! axum middleware that puts an [`AuthGate`] in front of a route.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::gate::{AuthError, AuthGate, bearer_token};
use super::scope::ScopeRequirement;

/// Middleware state: the shared gate plus the scopes this route declares.
#[derive(Clone)]
pub struct RequireAuth {
    gate: Arc<AuthGate>,
    scopes: ScopeRequirement,
}

impl RequireAuth {
    /// Require any valid token
    #[must_use]
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self {
            gate,
            scopes: ScopeRequirement::none(),
        }
    }

    /// Additionally require `scopes`
    #[must_use]
    pub fn with_scopes(mut self, scopes: ScopeRequirement) -> Self {
        self.scopes = scopes;
        self
    }

    /// Declared requirement
    #[must_use]
    pub fn scopes(&self) -> &ScopeRequirement {
        &self.scopes
    }
}

/// Authenticate the request and hand verified
/// [`TokenClaims`](super::TokenClaims) to the handler via request extensions.
pub async fn auth_middleware(
    State(auth): State<RequireAuth>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let token = bearer_token(request.headers());

    match auth.gate.authenticate(token, &auth.scopes).await {
        Ok(claims) => {
            debug!(path = %path, sub = %claims.subject(), "Authenticated request");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => {
            match &err {
                AuthError::Unauthenticated => {
                    warn!(path = %path, "Missing bearer token");
                }
                AuthError::KeyFetchFailed(cause) if cause.is_outage() => {
                    error!(path = %path, error = %cause, "Signing key unavailable");
                }
                AuthError::KeyFetchFailed(cause) => {
                    warn!(path = %path, error = %cause, "Token names an unknown signing key");
                }
                AuthError::TokenInvalid(cause) => {
                    warn!(path = %path, error = %cause, "Token rejected");
                }
                AuthError::Scope(cause) => {
                    warn!(path = %path, required = %auth.scopes, error = %cause, "Insufficient scope");
                }
            }
            err.into_response()
        }
    }
}
