//! HTTP router assembly

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::get};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::api;
use crate::Result;
use crate::auth::{AuthGate, KeyResolver, TokenValidator};
use crate::config::Config;
use crate::oauth::{self, OAuthProxy, ProtectedResourceMetadata};

/// Shared application state
pub struct AppState {
    /// Per-request authentication
    pub gate: Arc<AuthGate>,
    /// OAuth proxy endpoints
    pub oauth: Arc<OAuthProxy>,
    /// Protected-resource discovery document
    pub resource: ProtectedResourceMetadata,
    /// Per-request deadline
    pub request_timeout: Duration,
}

impl AppState {
    /// Wire every component from config around one outbound HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the outbound client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = config.http.build_client()?;
        let resolver = Arc::new(KeyResolver::from_config(config, http.clone()));
        Ok(Self::new(config, resolver, http))
    }

    /// Wire components around an existing resolver and client.
    #[must_use]
    pub fn new(config: &Config, resolver: Arc<KeyResolver>, http: reqwest::Client) -> Self {
        let scopes = api::advertised_scopes();
        Self {
            gate: Arc::new(AuthGate::new(resolver, TokenValidator::from_config(config))),
            oauth: Arc::new(OAuthProxy::from_config(config, http, scopes.clone())),
            resource: ProtectedResourceMetadata::for_resource(config, scopes),
            request_timeout: config.server.request_timeout,
        }
    }
}

/// Create the router
pub fn create_router(state: &AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(api::routes(&state.gate, state.resource.clone()))
        .merge(oauth::routes(Arc::clone(&state.oauth)))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    state.request_timeout,
                )),
        )
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
