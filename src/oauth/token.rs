//! Token Exchanger: the confidential back-channel `POST /oauth/token`.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CACHE_CONTROL, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::OAuthError;
use super::provider::{ProviderCredentials, ProviderEndpoints};
use crate::config::Config;

/// The only supported `grant_type`.
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// Body of an inbound token request.
///
/// Accepted as `application/json` or `application/x-www-form-urlencoded`,
/// chosen by `Content-Type`; anything else is read as a form.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequestBody {
    /// Must be `authorization_code`
    pub grant_type: Option<String>,
    /// Code issued by the provider
    pub code: Option<String>,
}

impl<S> FromRequest<S> for TokenRequestBody
where
    S: Send + Sync,
{
    type Rejection = OAuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/json") {
            Json::<Self>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|_| OAuthError::invalid_request("Invalid JSON in request body"))
        } else {
            Form::<Self>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|_| OAuthError::invalid_request("Invalid form-encoded request body"))
        }
    }
}

/// Provider response relayed to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    /// Provider's HTTP status
    pub status: StatusCode,
    /// Provider's JSON body
    pub body: Value,
}

impl IntoResponse for ProviderReply {
    fn into_response(self) -> Response {
        (self.status, [(CACHE_CONTROL, "no-store")], Json(self.body)).into_response()
    }
}

/// Exchanges authorization codes at the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
    credentials: Option<ProviderCredentials>,
}

impl TokenExchanger {
    /// Create an exchanger; `credentials` may be unset, which fails each
    /// exchange with a server error rather than start-up.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        endpoints: ProviderEndpoints,
        credentials: Option<ProviderCredentials>,
    ) -> Self {
        Self {
            http,
            endpoints,
            credentials,
        }
    }

    /// Create from config
    #[must_use]
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        Self::new(
            http,
            ProviderEndpoints::from_config(config),
            ProviderCredentials::from_config(config),
        )
    }

    /// Validate `request` and perform one POST to the provider.
    ///
    /// Provider error bodies are a successful relay, not an `Err`.
    ///
    /// # Errors
    ///
    /// `UnsupportedGrantType`, `InvalidRequest` for a missing field,
    /// `ServerConfig` without credentials, `ProviderUnavailable` when the
    /// provider cannot be reached or does not answer with JSON.
    pub async fn exchange(&self, request: TokenRequestBody) -> Result<ProviderReply, OAuthError> {
        let grant_type = request
            .grant_type
            .filter(|g| !g.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("Missing required parameter: grant_type"))?;

        if grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "Only grant_type=authorization_code is supported, got '{grant_type}'"
            )));
        }

        let code = request
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("Missing required parameter: code"))?;

        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| OAuthError::server_config("OAuth client credentials are not configured"))?;

        let params = [
            ("grant_type", GRANT_TYPE_AUTHORIZATION_CODE),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret()),
            ("code", code.as_str()),
            ("redirect_uri", self.endpoints.callback_url.as_str()),
        ];

        debug!(token_url = %self.endpoints.token_url, "Exchanging authorization code");
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token endpoint unreachable");
                OAuthError::ProviderUnavailable("Token endpoint unreachable".to_string())
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            warn!(status = %status, error = %e, "Token endpoint returned a non-JSON body");
            OAuthError::ProviderUnavailable(format!(
                "Token endpoint returned HTTP {status} without a JSON body"
            ))
        })?;

        if status.is_success() {
            debug!(status = %status, "Token exchange succeeded");
        } else {
            warn!(status = %status, error = ?body.get("error"), "Provider rejected token exchange");
        }

        // reqwest and axum share the `http` crate, so the status carries over as-is
        Ok(ProviderReply { status, body })
    }
}
