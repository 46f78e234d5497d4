//! Discovery documents
//!
//! RFC 8414 (Authorization Server Metadata) for the proxy endpoints and
//! RFC 9728 (Protected Resource Metadata) for the guarded API.

use serde::Serialize;
use url::Url;

use super::authorize::RESPONSE_TYPE_CODE;
use super::token::GRANT_TYPE_AUTHORIZATION_CODE;
use crate::config::Config;

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationServerMetadata {
    /// Authorization server issuer URL
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Signing-key document the issued tokens verify against
    pub jwks_uri: String,

    /// Supported grant types
    pub grant_types_supported: Vec<String>,

    /// Supported response types
    pub response_types_supported: Vec<String>,

    /// Supported scopes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    /// Supported token endpoint auth methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// OAuth Protected Resource Metadata (RFC 9728)
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedResourceMetadata {
    /// Protected resource identifier
    pub resource: String,

    /// Authorization servers that can issue tokens for this resource
    pub authorization_servers: Vec<String>,

    /// Supported bearer token methods
    pub bearer_methods_supported: Vec<String>,

    /// Scopes the resource's routes require
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Describe this proxy. The issuer is the origin serving the document
    /// (RFC 8414 section 3.3); the key set stays the remote provider's.
    #[must_use]
    pub fn for_proxy(config: &Config, scopes: Vec<String>) -> Self {
        let base = public_base_url(&config.oauth.callback_url);
        Self {
            issuer: base.clone(),
            authorization_endpoint: format!("{base}/oauth/authorize"),
            token_endpoint: format!("{base}/oauth/token"),
            jwks_uri: config.provider.jwks_url(),
            grant_types_supported: vec![GRANT_TYPE_AUTHORIZATION_CODE.to_string()],
            response_types_supported: vec![RESPONSE_TYPE_CODE.to_string()],
            scopes_supported: scopes,
            token_endpoint_auth_methods_supported: vec!["none".to_string()],
        }
    }
}

impl ProtectedResourceMetadata {
    /// Describe the guarded API served next to the proxy.
    #[must_use]
    pub fn for_resource(config: &Config, scopes: Vec<String>) -> Self {
        let base = public_base_url(&config.oauth.callback_url);
        Self {
            resource: base.clone(),
            authorization_servers: vec![base],
            bearer_methods_supported: vec!["header".to_string()],
            scopes_supported: scopes,
        }
    }
}

/// Extract the base URL (scheme + host + port) from a full URL
pub fn public_base_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.trim_end_matches('/').to_string();
    };

    let mut base = format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or("localhost")
    );

    if let Some(port) = parsed.port() {
        use std::fmt::Write;
        let _ = write!(base, ":{port}");
    }

    base
}
