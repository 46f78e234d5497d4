//! axum handlers for the proxy endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::info;

use super::authorize::{AuthorizationRedirector, AuthorizeRequest};
use super::callback::{CallbackParams, CallbackRelay};
use super::metadata::AuthorizationServerMetadata;
use super::token::{TokenExchanger, TokenRequestBody};
use crate::config::Config;

/// The three proxy components plus the metadata they advertise.
pub struct OAuthProxy {
    redirector: AuthorizationRedirector,
    exchanger: TokenExchanger,
    relay: CallbackRelay,
    metadata: AuthorizationServerMetadata,
}

impl OAuthProxy {
    /// Assemble the proxy
    #[must_use]
    pub fn new(
        redirector: AuthorizationRedirector,
        exchanger: TokenExchanger,
        relay: CallbackRelay,
        metadata: AuthorizationServerMetadata,
    ) -> Self {
        Self {
            redirector,
            exchanger,
            relay,
            metadata,
        }
    }

    /// Build every component from config, sharing one outbound client.
    #[must_use]
    pub fn from_config(config: &Config, http: reqwest::Client, scopes: Vec<String>) -> Self {
        Self::new(
            AuthorizationRedirector::from_config(config),
            TokenExchanger::from_config(config, http),
            CallbackRelay::from_config(config),
            AuthorizationServerMetadata::for_proxy(config, scopes),
        )
    }
}

/// Routes for `/oauth/*` and the authorization-server metadata document.
pub fn routes(proxy: Arc<OAuthProxy>) -> Router {
    Router::new()
        .route("/oauth/authorize", get(authorize_handler))
        .route("/oauth/callback", get(callback_handler))
        .route("/oauth/token", post(token_handler))
        .route(
            "/.well-known/oauth-authorization-server",
            get(metadata_handler),
        )
        .with_state(proxy)
}

async fn authorize_handler(
    State(proxy): State<Arc<OAuthProxy>>,
    request: AuthorizeRequest,
) -> Response {
    match proxy.redirector.redirect(request) {
        Ok(url) => {
            info!("Authorize request forwarded to provider");
            Redirect::to(url.as_str()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn callback_handler(
    State(proxy): State<Arc<OAuthProxy>>,
    params: CallbackParams,
) -> Response {
    match proxy.relay.relay(params) {
        Ok(target) => Redirect::to(&target).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn token_handler(State(proxy): State<Arc<OAuthProxy>>, body: TokenRequestBody) -> Response {
    match proxy.exchanger.exchange(body).await {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn metadata_handler(State(proxy): State<Arc<OAuthProxy>>) -> Json<AuthorizationServerMetadata> {
    Json(proxy.metadata.clone())
}
