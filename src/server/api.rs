//! Demo API guarded by the auth middleware.
//!
//! Each route declares its scopes when it is registered; handlers only see
//! requests that already carry verified [`TokenClaims`].

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    middleware,
    routing::{MethodRouter, get},
};
use serde_json::{Value, json};

use crate::auth::{AuthGate, RequireAuth, ScopeRequirement, TokenClaims, auth_middleware};
use crate::oauth::ProtectedResourceMetadata;

/// Grants read access to messages
pub const READ_MESSAGES: &str = "read:messages";
/// Grants write access to messages
pub const WRITE_MESSAGES: &str = "write:messages";
/// Grants delete access to messages
pub const DELETE_MESSAGES: &str = "delete:messages";

/// Every scope some route requires, for the discovery documents
#[must_use]
pub fn advertised_scopes() -> Vec<String> {
    [READ_MESSAGES, WRITE_MESSAGES, DELETE_MESSAGES]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `/api/*` routes plus the protected-resource metadata document.
pub fn routes(gate: &Arc<AuthGate>, resource: ProtectedResourceMetadata) -> Router {
    Router::new()
        .route("/api/public", get(public_handler))
        .route("/api/private", protected(gate, ScopeRequirement::none()))
        .route(
            "/api/private-scoped/readonly",
            protected(gate, ScopeRequirement::new([READ_MESSAGES])),
        )
        .route(
            "/api/private-scoped/write",
            protected(gate, ScopeRequirement::new([READ_MESSAGES, WRITE_MESSAGES])),
        )
        .route(
            "/api/private-scoped/delete",
            protected(gate, ScopeRequirement::new([DELETE_MESSAGES])),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(resource_metadata_handler),
        )
        .with_state(Arc::new(resource))
}

/// `GET` route returning the caller's claims, behind `scopes`
fn protected(
    gate: &Arc<AuthGate>,
    scopes: ScopeRequirement,
) -> MethodRouter<Arc<ProtectedResourceMetadata>> {
    let auth = RequireAuth::new(Arc::clone(gate)).with_scopes(scopes);
    get(claims_handler).route_layer(middleware::from_fn_with_state(auth, auth_middleware))
}

async fn public_handler() -> Json<Value> {
    Json(json!({
        "status": "success",
        "msg": "Success! This endpoint is publicly available and requires no authentication."
    }))
}

async fn claims_handler(Extension(claims): Extension<TokenClaims>) -> Json<TokenClaims> {
    Json(claims)
}

async fn resource_metadata_handler(
    State(resource): State<Arc<ProtectedResourceMetadata>>,
) -> Json<ProtectedResourceMetadata> {
    Json((*resource).clone())
}
