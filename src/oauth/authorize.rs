//! Authorization Redirector: `GET /oauth/authorize` to the provider.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::error::OAuthError;
use super::provider::ProviderEndpoints;
use super::state::AuthorizationState;
use crate::config::{Config, OAuthConfig};

/// The only supported `response_type` (authorization-code flow).
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Query parameters of an inbound authorize request
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be `code`
    pub response_type: Option<String>,
    /// Where the caller wants the code delivered
    pub redirect_uri: Option<String>,
    /// Requested scopes; defaults to the configured scope
    pub scope: Option<String>,
    /// Opaque caller state, returned untouched
    pub state: Option<String>,
}

/// Rejects an unparsable query string, including a repeated parameter, as
/// `invalid_request`.
impl<S> FromRequestParts<S> for AuthorizeRequest
where
    S: Send + Sync,
{
    type Rejection = OAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<Self>::from_request_parts(parts, state)
            .await
            .map(|Query(request)| request)
            .map_err(|e| {
                OAuthError::invalid_request(format!("Invalid query string: {}", e.body_text()))
            })
    }
}

/// Builds the provider redirect for an authorize request.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirector {
    endpoints: ProviderEndpoints,
    client_id: Option<String>,
    oauth: OAuthConfig,
}

impl AuthorizationRedirector {
    /// Create a redirector
    #[must_use]
    pub fn new(endpoints: ProviderEndpoints, client_id: Option<String>, oauth: OAuthConfig) -> Self {
        Self {
            endpoints,
            client_id,
            oauth,
        }
    }

    /// Create from config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ProviderEndpoints::from_config(config),
            config.provider.client_id.clone().filter(|id| !id.is_empty()),
            config.oauth.clone(),
        )
    }

    /// Validate `request` and return the provider URL to redirect to.
    ///
    /// The provider is always handed this service's own callback; the
    /// caller's `redirect_uri` and `state` travel inside the outbound `state`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for missing or unusable parameters,
    /// `UnsupportedResponseType` for anything but `code`, and `ServerConfig`
    /// when no client id is configured.
    pub fn redirect(&self, request: AuthorizeRequest) -> Result<Url, OAuthError> {
        let redirect_uri = request
            .redirect_uri
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_request("Missing required parameter: redirect_uri"))?;

        let response_type = request
            .response_type
            .filter(|rt| !rt.trim().is_empty())
            .ok_or_else(|| OAuthError::invalid_request("Missing required parameter: response_type"))?;

        if response_type != RESPONSE_TYPE_CODE {
            return Err(OAuthError::UnsupportedResponseType(format!(
                "Only response_type=code is supported, got '{response_type}'"
            )));
        }

        Url::parse(&redirect_uri).map_err(|e| {
            OAuthError::invalid_request(format!("redirect_uri is not an absolute URL: {e}"))
        })?;

        if !self.oauth.redirect_allowed(&redirect_uri) {
            return Err(OAuthError::invalid_request(
                "redirect_uri is not registered with this service",
            ));
        }

        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| OAuthError::server_config("OAuth client is not configured"))?;

        let scope = request
            .scope
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.oauth.default_scope.clone());

        let state = AuthorizationState::new(redirect_uri, request.state)
            .encode()
            .map_err(|e| OAuthError::server_config(format!("Failed to encode state: {e}")))?;

        let mut url = Url::parse(&self.endpoints.authorize_url)
            .map_err(|e| OAuthError::server_config(format!("Invalid authorize endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", RESPONSE_TYPE_CODE)
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &self.endpoints.callback_url)
            .append_pair("scope", &scope)
            .append_pair("state", &state);

        debug!(authorize_url = %self.endpoints.authorize_url, scope = %scope, "Redirecting to provider");
        Ok(url)
    }
}
