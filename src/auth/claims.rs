//! Verified token claims.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::scope::Scopes;

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "x"`
    Single(String),
    /// `"aud": ["x", "y"]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `expected` is (one of) the audience(s)
    #[must_use]
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Self::Single(aud) => aud == expected,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims as they come off the wire, before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawClaims {
    pub(crate) sub: String,
    pub(crate) iss: String,
    #[serde(default)]
    pub(crate) aud: Option<Audience>,
    pub(crate) exp: u64,
    #[serde(default)]
    pub(crate) scope: Option<Scopes>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

/// Decoded payload of a token that passed every validation step.
///
/// Only [`TokenValidator`](super::TokenValidator) produces these; handlers
/// behind the auth middleware read them from request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct TokenClaims {
    sub: String,
    iss: String,
    aud: Audience,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<Scopes>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenClaims {
    pub(crate) fn from_validated(raw: RawClaims, aud: Audience) -> Self {
        Self {
            sub: raw.sub,
            iss: raw.iss,
            aud,
            exp: raw.exp,
            scope: raw.scope,
            extra: raw.extra,
        }
    }

    /// `sub`, the subject identifier
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// `iss`, one of the accepted issuer forms
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.iss
    }

    /// `aud`
    #[must_use]
    pub fn audience(&self) -> &Audience {
        &self.aud
    }

    /// `exp` as seconds since the Unix epoch
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.exp
    }

    /// Granted scopes; `None` when the token has no `scope` claim at all
    #[must_use]
    pub fn scopes(&self) -> Option<&Scopes> {
        self.scope.as_ref()
    }

    /// Any other claim, passed through untouched
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// All claims besides the registered ones above
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}
