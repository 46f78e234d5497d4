//! The value threaded through the provider round trip in `state`.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Caller's redirect target and opaque state, carried inside the outbound
/// `state` parameter and recovered on callback.
///
/// Encoded as URL-safe base64 (no padding) of a compact JSON object, so it
/// survives the provider's redirect without further escaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Where the caller wants the code delivered
    #[serde(rename = "r")]
    pub redirect_uri: String,

    /// The caller's own `state`, if it sent one
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// `state` parameter that is not one of ours
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Not base64url
    #[error("state is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Decoded bytes are not the expected record
    #[error("state does not hold an authorization record: {0}")]
    Payload(#[from] serde_json::Error),
}

impl AuthorizationState {
    /// Pair a redirect target with the caller's state
    pub fn new(redirect_uri: impl Into<String>, state: Option<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            state,
        }
    }

    /// Serialize for the outbound `state` query parameter.
    ///
    /// # Errors
    ///
    /// Only if JSON serialization fails, which a two-string record cannot.
    pub fn encode(&self) -> Result<String, StateError> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Recover the record from an echoed `state` parameter.
    ///
    /// # Errors
    ///
    /// [`StateError`] when `raw` was not produced by [`encode`](Self::encode).
    pub fn decode(raw: &str) -> Result<Self, StateError> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
