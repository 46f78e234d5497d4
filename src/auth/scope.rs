//! Scope Enforcer: granted-scope sets and per-route requirements.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::claims::TokenClaims;

/// Set of permission strings granted by a token's `scope` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scopes(BTreeSet<String>);

impl Scopes {
    /// Empty scope set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a space-delimited scope string. Duplicates collapse.
    #[must_use]
    pub fn from_delimited(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Whether `scope` is granted
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Number of distinct granted scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no scope is granted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in lexical order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Scopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        )
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Scopes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Providers emit `scope` either as the RFC 8693 space-delimited string or
/// as a JSON array; both land in the same set.
impl<'de> Deserialize<'de> for Scopes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrVec {
            String(String),
            Vec(Vec<String>),
        }

        Ok(match StringOrVec::deserialize(deserializer)? {
            StringOrVec::String(s) => Self::from_delimited(&s),
            StringOrVec::Vec(v) => v.into_iter().collect(),
        })
    }
}

/// Ordered, de-duplicated set of scopes a route requires.
///
/// Declared once when the route is registered and never mutated; clones
/// share the same storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeRequirement(Arc<[String]>);

impl ScopeRequirement {
    /// Requirement satisfied by any valid token
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from a list of scopes, keeping first-seen order.
    pub fn new<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let ordered: Vec<String> = scopes
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.trim().is_empty() && seen.insert(s.clone()))
            .collect();
        Self(ordered.into())
    }

    /// Whether nothing is required
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Required scopes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Check a granted set (absent when the token carries no `scope` claim).
    ///
    /// Succeeds iff every required scope is granted; on failure every
    /// missing scope is reported, in declaration order.
    pub fn check(&self, granted: Option<&Scopes>) -> Result<(), ScopeError> {
        if self.is_empty() {
            return Ok(());
        }

        let granted = granted.ok_or(ScopeError::MissingScopeClaim)?;
        let missing: Vec<String> = self
            .iter()
            .filter(|scope| !granted.contains(scope))
            .map(str::to_owned)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScopeError::InsufficientScope { missing })
        }
    }
}

impl fmt::Display for ScopeRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Scope check failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// The token was issued without any `scope` claim.
    #[error("Missing required claim: \"scope\"")]
    MissingScopeClaim,

    /// The token lacks some required scopes.
    #[error("Missing required scopes: {}", .missing.join(", "))]
    InsufficientScope {
        /// Every required scope absent from the grant
        missing: Vec<String>,
    },
}

/// Enforce `required` against verified claims.
pub fn enforce(claims: &TokenClaims, required: &ScopeRequirement) -> Result<(), ScopeError> {
    required.check(claims.scopes())
}
