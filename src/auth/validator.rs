//! Token Validator: signature, expiry, issuer and audience checks.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Signature against the resolved key, RS256 only.
//! 2. `exp` must be in the future and `nbf`, when present, must not be
//!    (optional leeway for clock skew on both).
//! 3. `iss` must be one of the accepted issuer forms.
//! 4. `aud` must be (or contain) the configured audience.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::{Algorithm, TokenData, Validation};

use super::claims::{RawClaims, TokenClaims};
use super::jwks::SigningKey;
use crate::config::Config;

/// The only signature algorithm tokens may use.
pub const ACCEPTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Not a decodable compact JWS
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header has no `kid`
    #[error("token header has no 'kid'")]
    MissingKeyId,

    /// Signed (or keyed) with something other than RS256
    #[error("algorithm {0} is not accepted")]
    Algorithm(String),

    /// Signature does not verify against the resolved key
    #[error("invalid token signature")]
    Signature,

    /// `exp` is in the past
    #[error("token has expired")]
    Expired,

    /// `nbf` is still in the future
    #[error("token is not valid yet")]
    NotYetValid,

    /// `iss` is not an accepted issuer
    #[error("untrusted issuer '{0}'")]
    Issuer(String),

    /// `aud` is missing or does not name this service
    #[error("token audience does not match '{0}'")]
    Audience(String),

    /// Required claims missing or mistyped
    #[error("invalid claims: {0}")]
    Claims(String),
}

impl From<jsonwebtoken::errors::Error> for ValidationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidSignature => Self::Signature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::Algorithm("not RS256".to_string())
            }
            ErrorKind::MissingRequiredClaim(claim) => {
                Self::Claims(format!("missing required claim '{claim}'"))
            }
            ErrorKind::Json(e) => Self::Claims(e.to_string()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Validates bearer tokens against one audience and a set of issuers.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    issuers: Vec<String>,
    audience: String,
    leeway: Duration,
}

impl TokenValidator {
    /// Create a validator accepting any of `issuers` for `audience`.
    #[must_use]
    pub fn new(issuers: Vec<String>, audience: impl Into<String>, leeway: Duration) -> Self {
        Self {
            issuers,
            audience: audience.into(),
            leeway,
        }
    }

    /// Build from the provider and auth sections.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.provider.issuers(),
            config.provider.audience(),
            Duration::from_secs(config.auth.leeway_secs),
        )
    }

    /// Expected audience
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Read `kid` from the unverified header, rejecting foreign algorithms
    /// before any key lookup happens.
    pub fn key_id(token: &str) -> Result<String, ValidationError> {
        let header = jsonwebtoken::decode_header(token).map_err(|e| match e.kind() {
            // `alg: none` and unknown names fail header decoding outright
            ErrorKind::InvalidAlgorithmName => {
                ValidationError::Algorithm("unrecognised algorithm".to_string())
            }
            _ => ValidationError::Malformed(e.to_string()),
        })?;

        if header.alg != ACCEPTED_ALGORITHM {
            return Err(ValidationError::Algorithm(format!("{:?}", header.alg)));
        }

        header.kid.ok_or(ValidationError::MissingKeyId)
    }

    /// Run every check against `token` with the already-resolved `key`.
    pub fn validate(&self, token: &str, key: &SigningKey) -> Result<TokenClaims, ValidationError> {
        if let Some(alg) = key.algorithm() {
            if alg != KeyAlgorithm::RS256 {
                return Err(ValidationError::Algorithm(format!("{alg:?} (from key)")));
            }
        }

        let mut validation = Validation::new(ACCEPTED_ALGORITHM);
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Issuer and audience are checked below so the order and causes stay ours
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let data: TokenData<RawClaims> =
            jsonwebtoken::decode(token, key.decoding_key(), &validation)?;
        let raw = data.claims;

        if !self.issuers.iter().any(|iss| *iss == raw.iss) {
            return Err(ValidationError::Issuer(raw.iss));
        }

        let aud = match raw.aud.clone() {
            Some(aud) if aud.contains(&self.audience) => aud,
            _ => return Err(ValidationError::Audience(self.audience.clone())),
        };

        Ok(TokenClaims::from_validated(raw, aud))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    const SIGNING_KEY: &[u8] = include_bytes!("../../tests/fixtures/signing_key.pem");
    const ROGUE_KEY: &[u8] = include_bytes!("../../tests/fixtures/rogue_key.pem");
    const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");

    fn now() -> u64 {
        chrono::Utc::now().timestamp().unsigned_abs()
    }

    fn validator() -> TokenValidator {
        TokenValidator::new(
            vec!["https://api.descope.com/v1/apps/P1".to_string(), "P1".to_string()],
            "P1",
            Duration::ZERO,
        )
    }

    fn resolved_key() -> SigningKey {
        let set = super::super::jwks::SigningKeySet::from_document(JWKS.as_bytes()).unwrap();
        set.get("test-key-1").unwrap().clone()
    }

    fn claims() -> Value {
        json!({
            "sub": "U1",
            "iss": "P1",
            "aud": "P1",
            "exp": now() + 600,
            "scope": "read:messages"
        })
    }

    fn mint_with(pem: &[u8], claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("test-key-1".to_string());
        encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
    }

    fn mint(claims: &Value) -> String {
        mint_with(SIGNING_KEY, claims)
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = validator().validate(&mint(&claims()), &resolved_key()).unwrap();
        assert_eq!(claims.subject(), "U1");
        assert!(claims.scopes().unwrap().contains("read:messages"));
    }

    #[test]
    fn both_issuer_forms_are_accepted() {
        let mut c = claims();
        c["iss"] = json!("https://api.descope.com/v1/apps/P1");
        assert!(validator().validate(&mint(&c), &resolved_key()).is_ok());
    }

    #[test]
    fn key_id_comes_from_header() {
        assert_eq!(TokenValidator::key_id(&mint(&claims())).unwrap(), "test-key-1");
    }

    #[test]
    fn missing_kid_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::RS256),
            &claims(),
            &EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap(),
        )
        .unwrap();
        assert_eq!(TokenValidator::key_id(&token), Err(ValidationError::MissingKeyId));
    }

    #[test]
    fn hs256_token_is_rejected_before_lookup() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("test-key-1".to_string());
        let token = encode(&header, &claims(), &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(matches!(
            TokenValidator::key_id(&token),
            Err(ValidationError::Algorithm(_))
        ));
    }

    #[test]
    fn alg_none_is_rejected() {
        use base64::Engine as _;
        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = b64.encode(br#"{"alg":"none","typ":"JWT","kid":"test-key-1"}"#);
        let payload = b64.encode(claims().to_string());
        let token = format!("{header}.{payload}.");

        assert!(TokenValidator::key_id(&token).is_err());
        assert!(validator().validate(&token, &resolved_key()).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            TokenValidator::key_id("not-a-jwt"),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn foreign_signature_fails() {
        let token = mint_with(ROGUE_KEY, &claims());
        assert_eq!(
            validator().validate(&token, &resolved_key()).unwrap_err(),
            ValidationError::Signature
        );
    }

    #[test]
    fn expired_token_mentions_expiry() {
        let mut c = claims();
        c["exp"] = json!(now() - 120);
        let err = validator().validate(&mint(&c), &resolved_key()).unwrap_err();
        assert_eq!(err, ValidationError::Expired);
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn future_nbf_is_rejected() {
        let mut c = claims();
        c["nbf"] = json!(now() + 3600);
        let err = validator().validate(&mint(&c), &resolved_key()).unwrap_err();
        assert_eq!(err, ValidationError::NotYetValid);
        assert!(err.to_string().contains("not valid yet"));
    }

    #[test]
    fn past_nbf_and_skewed_nbf_within_leeway_pass() {
        let mut c = claims();
        c["nbf"] = json!(now() - 60);
        assert!(validator().validate(&mint(&c), &resolved_key()).is_ok());

        c["nbf"] = json!(now() + 5);
        let lenient = TokenValidator::new(vec!["P1".to_string()], "P1", Duration::from_secs(60));
        assert!(lenient.validate(&mint(&c), &resolved_key()).is_ok());
    }

    #[test]
    fn leeway_tolerates_small_skew() {
        let mut c = claims();
        c["exp"] = json!(now() - 5);
        let lenient = TokenValidator::new(vec!["P1".to_string()], "P1", Duration::from_secs(60));
        assert!(lenient.validate(&mint(&c), &resolved_key()).is_ok());
    }

    #[test]
    fn unknown_issuer_fails() {
        let mut c = claims();
        c["iss"] = json!("https://evil.example");
        assert_eq!(
            validator().validate(&mint(&c), &resolved_key()).unwrap_err(),
            ValidationError::Issuer("https://evil.example".to_string())
        );
    }

    #[test]
    fn wrong_audience_fails_even_with_good_signature_and_issuer() {
        let mut c = claims();
        c["aud"] = json!("P2");
        assert!(matches!(
            validator().validate(&mint(&c), &resolved_key()),
            Err(ValidationError::Audience(_))
        ));

        c["aud"] = json!(["P2", "P3"]);
        assert!(matches!(
            validator().validate(&mint(&c), &resolved_key()),
            Err(ValidationError::Audience(_))
        ));

        c.as_object_mut().unwrap().remove("aud");
        assert!(matches!(
            validator().validate(&mint(&c), &resolved_key()),
            Err(ValidationError::Audience(_))
        ));
    }

    #[test]
    fn audience_array_containing_project_passes() {
        let mut c = claims();
        c["aud"] = json!(["other", "P1"]);
        assert!(validator().validate(&mint(&c), &resolved_key()).is_ok());
    }

    #[test]
    fn expiry_is_checked_before_issuer() {
        let mut c = claims();
        c["exp"] = json!(now() - 120);
        c["iss"] = json!("https://evil.example");
        assert_eq!(
            validator().validate(&mint(&c), &resolved_key()).unwrap_err(),
            ValidationError::Expired
        );
    }

    #[test]
    fn missing_exp_is_rejected() {
        let mut c = claims();
        c.as_object_mut().unwrap().remove("exp");
        assert!(matches!(
            validator().validate(&mint(&c), &resolved_key()),
            Err(ValidationError::Claims(_))
        ));
    }

    #[test]
    fn key_tagged_for_other_algorithm_is_refused() {
        let fixture: Value = serde_json::from_str(JWKS).unwrap();
        let n = fixture["keys"][0]["n"].clone();
        let doc = json!({
            "keys": [{ "kty": "RSA", "kid": "ps", "alg": "PS256", "use": "sig", "n": n, "e": "AQAB" }]
        });
        let set = super::super::jwks::SigningKeySet::from_document(doc.to_string().as_bytes())
            .unwrap();
        let key = set.get("ps").unwrap();
        assert!(matches!(
            validator().validate(&mint(&claims()), key),
            Err(ValidationError::Algorithm(_))
        ));
    }
}
