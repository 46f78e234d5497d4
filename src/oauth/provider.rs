//! Remote provider endpoints and confidential client credentials.

use std::fmt;

use crate::config::Config;

/// Confidential client id and secret for the back-channel token call.
///
/// Loaded once at start-up. `Debug` never prints the secret.
#[derive(Clone)]
pub struct ProviderCredentials {
    client_id: String,
    client_secret: String,
}

impl ProviderCredentials {
    /// Bundle an id and secret
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Credentials from config; `None` unless both halves are set and non-empty
    #[must_use]
    pub fn from_config(config: &Config) -> Option<Self> {
        let id = config.provider.client_id.as_deref().filter(|s| !s.is_empty())?;
        let secret = config
            .provider
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())?;
        Some(Self::new(id, secret))
    }

    /// Public client identifier
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Where the provider lives and how this service is registered with it.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    /// Remote authorize endpoint
    pub authorize_url: String,
    /// Remote token endpoint
    pub token_url: String,
    /// This service's pre-registered callback
    pub callback_url: String,
}

impl ProviderEndpoints {
    /// Endpoints from the provider and oauth sections
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            authorize_url: config.provider.authorize_url(),
            token_url: config.provider.token_url(),
            callback_url: config.oauth.callback_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let creds = ProviderCredentials::new("app-1", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("app-1"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn both_halves_required() {
        let mut config = Config::default();
        config.provider.client_id = Some("app-1".into());
        assert!(ProviderCredentials::from_config(&config).is_none());

        config.provider.client_secret = Some(String::new());
        assert!(ProviderCredentials::from_config(&config).is_none());

        config.provider.client_secret = Some("s3cret".into());
        let creds = ProviderCredentials::from_config(&config).unwrap();
        assert_eq!(creds.client_id(), "app-1");
        assert_eq!(creds.client_secret(), "s3cret");
    }

    #[test]
    fn endpoints_follow_config() {
        let mut config = Config::default();
        config.provider.project_id = "P1".into();
        config.oauth.callback_url = "https://gate.example/oauth/callback".into();
        let endpoints = ProviderEndpoints::from_config(&config);
        assert_eq!(
            endpoints.authorize_url,
            "https://api.descope.com/oauth2/v1/apps/authorize"
        );
        assert_eq!(endpoints.callback_url, "https://gate.example/oauth/callback");
    }
}
