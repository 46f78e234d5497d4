//! Callback Relay: provider redirect back to the caller's application.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::{debug, warn};
use url::form_urlencoded;

use super::error::OAuthError;
use super::state::AuthorizationState;
use crate::config::{Config, OAuthConfig};

/// OAuth callback query parameters
#[derive(Debug, Default)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,

    /// Echoed `state`, holding an [`AuthorizationState`]
    pub state: Option<String>,

    /// Error code
    pub error: Option<String>,

    /// Error description
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Read the parameters from a raw query string.
    ///
    /// Parsing never fails. A parameter given more than once is ambiguous
    /// and treated as absent, so a repeated `state` ends at the default
    /// target and a repeated `code` is a missing code. Unknown parameters
    /// are ignored.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut seen: HashMap<String, Option<String>> = HashMap::new();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            seen.entry(name.into_owned())
                .and_modify(|v| *v = None)
                .or_insert_with(|| Some(value.into_owned()));
        }

        let mut take = |name: &str| seen.remove(name).flatten();
        Self {
            code: take("code"),
            state: take("state"),
            error: take("error"),
            error_description: take("error_description"),
        }
    }
}

impl<S> FromRequestParts<S> for CallbackParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_query(parts.uri.query().unwrap_or_default()))
    }
}

/// Turns a provider callback into the caller-facing redirect target.
#[derive(Debug, Clone)]
pub struct CallbackRelay {
    oauth: OAuthConfig,
}

impl CallbackRelay {
    /// Create a relay
    #[must_use]
    pub fn new(oauth: OAuthConfig) -> Self {
        Self { oauth }
    }

    /// Create from config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.oauth.clone())
    }

    /// Compute where to send the user agent.
    ///
    /// A `state` that cannot be decoded, or that names a target outside the
    /// allow-list, falls back to the configured default target.
    ///
    /// # Errors
    ///
    /// `Provider` when the provider reported an error (nothing is forwarded
    /// to the caller's application), `InvalidRequest` when there is no code.
    pub fn relay(&self, params: CallbackParams) -> Result<String, OAuthError> {
        if let Some(error) = params.error {
            warn!(error = %error, description = ?params.error_description, "Provider returned an authorization error");
            return Err(OAuthError::Provider {
                error,
                description: params.error_description,
            });
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuthError::invalid_request("Missing required parameter: code"))?;

        let recovered = params.state.as_deref().and_then(|raw| {
            AuthorizationState::decode(raw)
                .inspect_err(|e| warn!(error = %e, "Undecodable callback state, using default redirect"))
                .ok()
        });

        let (target, caller_state) = match recovered {
            Some(state) if self.oauth.redirect_allowed(&state.redirect_uri) => {
                (state.redirect_uri, state.state)
            }
            Some(state) => {
                warn!(redirect_uri = %state.redirect_uri, "Callback state names a disallowed target, using default redirect");
                (self.oauth.default_redirect_uri.clone(), state.state)
            }
            None => (self.oauth.default_redirect_uri.clone(), None),
        };

        let mut pairs = vec![("code", code.as_str())];
        if let Some(caller_state) = caller_state.as_deref() {
            pairs.push(("state", caller_state));
        }

        debug!(target = %target, "Relaying authorization code to caller");
        Ok(append_query(&target, &pairs))
    }
}

/// Append `pairs` to `target`'s query string, keeping any fragment last.
fn append_query(target: &str, pairs: &[(&str, &str)]) -> String {
    let (base, fragment) = match target.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target, None),
    };

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();

    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut out = format!("{base}{separator}{encoded}");
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
