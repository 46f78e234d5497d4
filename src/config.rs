//! Configuration management
//!
//! Built once at start-up from defaults, an optional YAML file and the
//! process environment, then handed to each component explicitly.

use std::{env, fmt, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Prefix for nested environment overrides (`TOKEN_GATE_PROVIDER__AUDIENCE`).
pub const ENV_PREFIX: &str = "TOKEN_GATE_";

/// Flat environment names understood for compatibility with existing
/// provider deployments, mapped onto their config paths.
const PROVIDER_ENV_ALIASES: &[(&str, &str)] = &[
    ("DESCOPE_PROJECT_ID", "provider.project_id"),
    ("DESCOPE_API_BASE_URL", "provider.base_url"),
    ("DESCOPE_INBOUND_APP_CLIENT_ID", "provider.client_id"),
    ("DESCOPE_INBOUND_APP_CLIENT_SECRET", "provider.client_secret"),
];

/// Main configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before the environment is read.
    /// Paths support ~ expansion. Loaded in order; variables already set in
    /// the process environment win.
    #[serde(default = "default_env_files")]
    pub env_files: Vec<String>,
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Remote identity provider
    pub provider: ProviderConfig,
    /// Outbound HTTP client settings
    pub http: HttpConfig,
    /// Bearer-token verification settings
    pub auth: AuthConfig,
    /// OAuth proxy settings
    pub oauth: OAuthConfig,
}

fn default_env_files() -> Vec<String> {
    vec![".env".to_string()]
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or the merged configuration fails [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Env files have to land in the process environment before the
        // Env providers below snapshot it.
        let env_files: Vec<String> = figment
            .extract_inner("env_files")
            .unwrap_or_else(|_| default_env_files());
        load_env_files(&env_files);

        figment = figment
            .merge(provider_alias_env())
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.provider.client_secret = config.provider.resolve_client_secret();
        config.validate()?;

        Ok(config)
    }

    /// Check the merged configuration for values no component can work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.provider.project_id.trim().is_empty() {
            return Err(Error::config(
                "provider.project_id is required (set DESCOPE_PROJECT_ID or TOKEN_GATE_PROVIDER__PROJECT_ID)",
            ));
        }

        for (field, value) in [
            ("provider.base_url", self.provider.base_url.clone()),
            ("provider.jwks_url", self.provider.jwks_url()),
            ("provider.authorize_url", self.provider.authorize_url()),
            ("provider.token_url", self.provider.token_url()),
            ("oauth.callback_url", self.oauth.callback_url.clone()),
        ] {
            Url::parse(&value)
                .map_err(|e| Error::Config(format!("{field} is not a valid URL ({value}): {e}")))?;
        }

        if self.provider.issuers().is_empty() {
            return Err(Error::config("provider.issuers must not be empty"));
        }

        if self.oauth.default_redirect_uri.trim().is_empty() {
            return Err(Error::config("oauth.default_redirect_uri must not be empty"));
        }

        Ok(())
    }
}

/// Environment provider that maps the flat provider variable names.
fn provider_alias_env() -> Env {
    Env::raw().filter_map(|key| {
        PROVIDER_ENV_ALIASES
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}

/// Load environment files into the process environment.
/// Supports ~ expansion. Files that don't exist are silently skipped.
fn load_env_files(paths: &[String]) {
    for path_str in paths {
        let expanded = if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                path_str.replacen('~', &home.display().to_string(), 1)
            } else {
                path_str.clone()
            }
        } else {
            path_str.clone()
        };

        let path = Path::new(&expanded);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(()) => {
                    tracing::info!("Loaded env file: {expanded}");
                }
                Err(e) => {
                    tracing::warn!("Failed to load env file {expanded}: {e}");
                }
            }
        } else {
            tracing::debug!("Env file not found (skipped): {expanded}");
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Upper bound for handling one inbound request, outbound calls included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote identity provider configuration.
///
/// Only `project_id` is mandatory; every endpoint and the accepted
/// issuer/audience values derive from it and `base_url` unless overridden.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider API base URL
    pub base_url: String,
    /// Project (tenant) identifier
    pub project_id: String,
    /// Expected `aud` claim (default: the project id)
    pub audience: Option<String>,
    /// Accepted `iss` claim values (default: app URL form and bare project id)
    pub issuers: Vec<String>,
    /// Well-known key document URL
    pub jwks_url: Option<String>,
    /// Remote authorization endpoint
    pub authorize_url: Option<String>,
    /// Remote token endpoint
    pub token_url: Option<String>,
    /// Confidential client id for the code exchange
    pub client_id: Option<String>,
    /// Confidential client secret (supports `env:VAR_NAME`)
    pub client_secret: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.descope.com".to_string(),
            project_id: String::new(),
            audience: None,
            issuers: Vec::new(),
            jwks_url: None,
            authorize_url: None,
            token_url: None,
            client_id: None,
            client_secret: None,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("audience", &self.audience)
            .field("issuers", &self.issuers)
            .field("jwks_url", &self.jwks_url)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Expected audience
    #[must_use]
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.project_id.clone())
    }

    /// Accepted issuer values.
    ///
    /// The provider names itself either by its app URL or by the bare
    /// project id, so both are accepted unless overridden.
    #[must_use]
    pub fn issuers(&self) -> Vec<String> {
        if !self.issuers.is_empty() {
            return self.issuers.clone();
        }
        vec![
            format!("{}/v1/apps/{}", self.base(), self.project_id),
            self.project_id.clone(),
        ]
    }

    /// Well-known key document URL
    #[must_use]
    pub fn jwks_url(&self) -> String {
        self.jwks_url.clone().unwrap_or_else(|| {
            format!("{}/{}/.well-known/jwks.json", self.base(), self.project_id)
        })
    }

    /// Remote authorization endpoint
    #[must_use]
    pub fn authorize_url(&self) -> String {
        self.authorize_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth2/v1/apps/authorize", self.base()))
    }

    /// Remote token endpoint
    #[must_use]
    pub fn token_url(&self) -> String {
        self.token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth2/v1/apps/token", self.base()))
    }

    /// Resolve the client secret (expand `env:VAR_NAME`)
    #[must_use]
    pub fn resolve_client_secret(&self) -> Option<String> {
        self.client_secret.as_ref().map(|secret| {
            if let Some(var_name) = secret.strip_prefix("env:") {
                env::var(var_name).unwrap_or_else(|_| secret.clone())
            } else {
                secret.clone()
            }
        })
    }
}

/// Outbound HTTP client configuration (key-set fetch, token exchange)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total timeout per outbound request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Connect timeout per outbound request
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// `User-Agent` sent on every outbound request. Some provider edges
    /// reject library default agents as bot traffic.
    pub user_agent: String,
    /// Refuse plain-HTTP outbound URLs
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!(
                "Mozilla/5.0 (compatible; token-gate/{})",
                env!("CARGO_PKG_VERSION")
            ),
            https_only: true,
        }
    }
}

impl HttpConfig {
    /// Build the shared outbound client
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .https_only(self.https_only)
            .build()
            .map_err(Error::from)
    }
}

/// Bearer-token verification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Clock skew tolerated on `exp`, in seconds
    pub leeway_secs: u64,
    /// Fetch the key set once at start-up instead of on first request
    pub prefetch_keys: bool,
    /// Minimum gap between key-set fetches triggered by an unknown `kid`
    #[serde(with = "humantime_serde")]
    pub min_refresh_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            leeway_secs: 0,
            prefetch_keys: true,
            min_refresh_interval: crate::auth::DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// OAuth proxy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// This service's callback, as pre-registered with the provider
    pub callback_url: String,
    /// Where the callback sends the user when `state` cannot be decoded
    pub default_redirect_uri: String,
    /// Scope requested when the caller names none
    pub default_scope: String,
    /// Prefixes a caller `redirect_uri` must start with; empty allows any
    pub allowed_redirect_uris: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_url: "http://127.0.0.1:8000/oauth/callback".to_string(),
            default_redirect_uri: "/".to_string(),
            default_scope: "openid".to_string(),
            allowed_redirect_uris: Vec::new(),
        }
    }
}

impl OAuthConfig {
    /// Whether `uri` may receive the authorization code
    #[must_use]
    pub fn redirect_allowed(&self, uri: &str) -> bool {
        self.allowed_redirect_uris.is_empty()
            || self
                .allowed_redirect_uris
                .iter()
                .any(|prefix| uri.starts_with(prefix.as_str()))
    }
}

/// Human-readable durations for serde (`"30s"`, `"5m"`, `"100ms"`, `"10"`)
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer};

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(u64),
            Text(String),
        }

        let s = match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => return Ok(Duration::from_secs(secs)),
            Raw::Text(s) => s,
        };

        // "ms" must be checked before "s"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
