//! Troubleshooting commands: key-set check and token inspection.
//!
//! The token is decoded unverified first, then checked by the real gate for
//! the verdict.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

use crate::auth::{AuthGate, KeyResolver, ScopeRequirement, TokenValidator};
use crate::config::Config;
use crate::{Error, Result};

/// Outcome of `check-keys`
#[derive(Debug, Clone)]
pub struct KeySetReport {
    /// Where the keys were fetched from
    pub jwks_url: String,
    /// Usable key ids, sorted
    pub key_ids: Vec<String>,
}

impl fmt::Display for KeySetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key set URL: {}", self.jwks_url)?;
        writeln!(f, "Usable signing keys: {}", self.key_ids.len())?;
        for kid in &self.key_ids {
            writeln!(f, "  - {kid}")?;
        }
        Ok(())
    }
}

/// Fetch the provider's key set once and list its usable keys.
pub async fn check_keys(config: &Config) -> Result<KeySetReport> {
    let resolver = KeyResolver::from_config(config, config.http.build_client()?);
    let keys = resolver.refresh().await?;
    Ok(KeySetReport {
        jwks_url: resolver.jwks_url().to_string(),
        key_ids: keys.key_ids().into_iter().map(String::from).collect(),
    })
}

/// Outcome of `inspect-token`
#[derive(Debug, Clone)]
pub struct TokenReport {
    /// Unverified JOSE header
    pub header: Map<String, Value>,
    /// Unverified payload
    pub claims: Map<String, Value>,
    /// Whether `kid` is in the live key set; `None` when the set could not be fetched
    pub key_found: Option<bool>,
    /// Key ids in the live key set
    pub available_keys: Vec<String>,
    /// Expected audience
    pub expected_audience: String,
    /// Accepted issuers
    pub expected_issuers: Vec<String>,
    /// `Ok` if the token passes full verification, else the rejection cause
    pub verdict: std::result::Result<(), String>,
}

impl TokenReport {
    /// `kid` from the header
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }

    /// Whether `exp` is in the past (unverified)
    #[must_use]
    pub fn is_expired(&self) -> Option<bool> {
        let exp = self.claims.get("exp").and_then(Value::as_i64)?;
        Some(exp <= chrono::Utc::now().timestamp())
    }
}

impl fmt::Display for TokenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<&Value>| v.map_or_else(|| "(absent)".to_string(), Value::to_string);

        writeln!(f, "Header")?;
        writeln!(f, "  kid: {}", show(self.header.get("kid")))?;
        writeln!(f, "  alg: {}", show(self.header.get("alg")))?;
        writeln!(f, "  typ: {}", show(self.header.get("typ")))?;
        writeln!(f, "Claims (unverified)")?;
        for name in ["sub", "iss", "aud", "exp", "scope"] {
            writeln!(f, "  {name}: {}", show(self.claims.get(name)))?;
        }
        if let Some(exp) = self.claims.get("exp").and_then(Value::as_i64) {
            if let Some(at) = chrono::DateTime::from_timestamp(exp, 0) {
                let state = if self.is_expired() == Some(true) { "expired" } else { "valid" };
                writeln!(f, "  exp at: {} ({state})", at.to_rfc3339())?;
            }
        }
        writeln!(f, "Expected")?;
        writeln!(f, "  aud: {}", self.expected_audience)?;
        writeln!(f, "  iss: {}", self.expected_issuers.join(" | "))?;
        writeln!(f, "Key set")?;
        match self.key_found {
            Some(true) => writeln!(f, "  kid found")?,
            Some(false) => {
                writeln!(f, "  kid NOT found; available keys:")?;
                for kid in &self.available_keys {
                    writeln!(f, "    - {kid}")?;
                }
            }
            None => writeln!(f, "  key set could not be fetched")?,
        }
        match &self.verdict {
            Ok(()) => writeln!(f, "Verdict: token is valid"),
            Err(cause) => writeln!(f, "Verdict: rejected ({cause})"),
        }
    }
}

/// Decode `token` without verification and explain whether it would pass.
pub async fn inspect_token(config: &Config, token: &str) -> Result<TokenReport> {
    let token = token.trim();
    let mut parts = token.splitn(3, '.');
    let (Some(header), Some(payload), Some(_)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(Error::Internal(
            "token is not a compact JWS (expected header.payload.signature)".to_string(),
        ));
    };
    let header = decode_segment(header, "header")?;
    let claims = decode_segment(payload, "payload")?;

    let resolver = Arc::new(KeyResolver::from_config(config, config.http.build_client()?));

    let (key_found, available_keys) = match resolver.refresh().await {
        Ok(keys) => {
            let found = header
                .get("kid")
                .and_then(Value::as_str)
                .is_some_and(|kid| keys.get(kid).is_some());
            (
                Some(found),
                keys.key_ids().into_iter().map(String::from).collect(),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Key set fetch failed");
            (None, Vec::new())
        }
    };

    let gate = AuthGate::new(resolver, TokenValidator::from_config(config));
    let verdict = gate
        .authenticate(Some(token), &ScopeRequirement::none())
        .await
        .map(|_| ())
        .map_err(|e| e.to_string());

    Ok(TokenReport {
        header,
        claims,
        key_found,
        available_keys,
        expected_audience: config.provider.audience(),
        expected_issuers: config.provider.issuers(),
        verdict,
    })
}

fn decode_segment(segment: &str, what: &str) -> Result<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| Error::Internal(format!("token {what} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Internal(format!("token {what} is not a JSON object: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_segment_reads_json_object() {
        let seg = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"k1"}"#);
        let map = decode_segment(&seg, "header").unwrap();
        assert_eq!(map["kid"], "k1");
    }

    #[test]
    fn decode_segment_rejects_non_object() {
        let seg = URL_SAFE_NO_PAD.encode(b"[1,2]");
        assert!(decode_segment(&seg, "payload").is_err());
        assert!(decode_segment("***", "payload").is_err());
    }

    #[test]
    fn report_flags_expiry() {
        let mut claims = Map::new();
        claims.insert("exp".into(), Value::from(1_000));
        let report = TokenReport {
            header: Map::new(),
            claims,
            key_found: Some(false),
            available_keys: vec!["a".into()],
            expected_audience: "P1".into(),
            expected_issuers: vec!["P1".into()],
            verdict: Err("Token validation failed: token has expired".into()),
        };
        assert_eq!(report.is_expired(), Some(true));
        let text = report.to_string();
        assert!(text.contains("expired"));
        assert!(text.contains("kid NOT found"));
        assert!(text.contains("- a"));
    }

    #[tokio::test]
    async fn malformed_token_is_reported_without_network() {
        let err = inspect_token(&Config::default(), "abc").await.unwrap_err();
        assert!(err.to_string().contains("compact JWS"));
    }
}
