//! Shared fixtures: a mock provider, token minting and an in-process router.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use token_gate::config::Config;
use token_gate::server::{AppState, create_router};

pub const PROJECT_ID: &str = "P1";
pub const KID: &str = "test-key-1";
pub const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
pub const ROGUE_KEY: &[u8] = include_bytes!("../fixtures/rogue_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const CALLBACK_URL: &str = "https://gate.example/oauth/callback";

pub fn now() -> u64 {
    chrono::Utc::now().timestamp().unsigned_abs()
}

/// Claims that pass every check, with `scope` as given
pub fn claims(scope: Option<&str>) -> Value {
    let mut claims = json!({
        "sub": "U1",
        "iss": PROJECT_ID,
        "aud": PROJECT_ID,
        "exp": now() + 600,
        "email": "alice@example.com"
    });
    if let Some(scope) = scope {
        claims["scope"] = json!(scope);
    }
    claims
}

/// Sign `claims` with `pem` under `kid`
pub fn mint_with(pem: &[u8], kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

/// Sign `claims` with the fixture key the mock provider publishes
pub fn mint(claims: &Value) -> String {
    mint_with(SIGNING_KEY, Some(KID), claims)
}

/// Mock provider serving the fixture key set at `/jwks.json`
pub async fn provider() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
        .mount(&server)
        .await;
    server
}

/// Config pointing every provider endpoint at `server`
pub fn config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.env_files = Vec::new();
    config.provider.project_id = PROJECT_ID.to_string();
    config.provider.base_url = server.uri();
    config.provider.jwks_url = Some(format!("{}/jwks.json", server.uri()));
    config.provider.authorize_url = Some(format!("{}/authorize", server.uri()));
    config.provider.token_url = Some(format!("{}/token", server.uri()));
    config.provider.client_id = Some("app-1".to_string());
    config.provider.client_secret = Some("s3cret".to_string());
    config.http.https_only = false;
    config.oauth.callback_url = CALLBACK_URL.to_string();
    config.oauth.default_redirect_uri = "https://app.example/home".to_string();
    config
}

/// In-process router for `config`
pub fn app(config: &Config) -> Router {
    let state = AppState::from_config(config).unwrap();
    create_router(&state)
}

/// Collected response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to send request");

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        json,
    }
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> TestResponse {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}
