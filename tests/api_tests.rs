//! Router tests for the guarded demo API, health and discovery endpoints.

mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{claims, get, mint, now};

#[tokio::test]
async fn test_health() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let res = get(&app, "/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["status"], "healthy");
    assert_eq!(res.json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_public_endpoint_needs_no_token() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let res = get(&app, "/api/public", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["status"], "success");
    assert!(res.json["msg"].as_str().unwrap().contains("publicly available"));
}

#[tokio::test]
async fn test_private_without_token_is_401_with_challenge() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    for uri in [
        "/api/private",
        "/api/private-scoped/readonly",
        "/api/private-scoped/write",
        "/api/private-scoped/delete",
    ] {
        let res = get(&app, uri, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(res.headers.get("www-authenticate").unwrap(), "Bearer");
        assert_eq!(res.json["error"], "unauthenticated");
        assert_eq!(res.json["detail"], "Requires authentication");
    }
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthenticated() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let req = Request::get("/api/private")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let res = common::send(&app, req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_private_returns_verified_claims() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));
    let token = mint(&claims(None));

    let res = get(&app, "/api/private", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["sub"], "U1");
    assert_eq!(res.json["iss"], "P1");
    assert_eq!(res.json["email"], "alice@example.com");
}

#[tokio::test]
async fn test_invalid_token_is_403_unauthorized() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let mut expired = claims(Some("read:messages"));
    expired["exp"] = json!(now() - 60);

    for token in [mint(&expired), "not.a.jwt".to_string()] {
        let res = get(&app, "/api/private", Some(&token)).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.json["error"], "unauthorized");
        assert!(res.headers.get("www-authenticate").is_none());
    }
}

#[tokio::test]
async fn test_readonly_scope() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let ok = mint(&claims(Some("read:messages")));
    let res = get(&app, "/api/private-scoped/readonly", Some(&ok)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["scope"], "read:messages");

    let wrong = mint(&claims(Some("write:messages")));
    let res = get(&app, "/api/private-scoped/readonly", Some(&wrong)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.json["detail"].as_str().unwrap().contains("read:messages"));
}

#[tokio::test]
async fn test_write_requires_both_scopes() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let both = mint(&claims(Some("write:messages read:messages")));
    let res = get(&app, "/api/private-scoped/write", Some(&both)).await;
    assert_eq!(res.status, StatusCode::OK);

    let write_only = mint(&claims(Some("write:messages")));
    let res = get(&app, "/api/private-scoped/write", Some(&write_only)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.json["detail"], "Missing required scopes: read:messages");
}

#[tokio::test]
async fn test_delete_scope() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let ok = mint(&claims(Some("delete:messages")));
    assert_eq!(
        get(&app, "/api/private-scoped/delete", Some(&ok)).await.status,
        StatusCode::OK
    );

    let none = mint(&claims(None));
    let res = get(&app, "/api/private-scoped/delete", Some(&none)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.json["detail"], "Missing required claim: \"scope\"");
}

#[tokio::test]
async fn test_key_set_outage_is_403() {
    let server = wiremock::MockServer::start().await;
    let app = common::app(&common::config(&server));

    // Nothing mounted: the key set fetch gets a 404
    let res = get(&app, "/api/private", Some(&mint(&claims(None)))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.json["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_resource_metadata() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let res = get(&app, "/.well-known/oauth-protected-resource", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["resource"], "https://gate.example");
    assert_eq!(res.json["authorization_servers"], json!(["https://gate.example"]));
    assert_eq!(res.json["bearer_methods_supported"], json!(["header"]));
    assert_eq!(
        res.json["scopes_supported"],
        json!(["read:messages", "write:messages", "delete:messages"])
    );
}

#[tokio::test]
async fn test_request_id_is_assigned_and_propagated() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    let res = get(&app, "/health", None).await;
    assert!(res.headers.get("x-request-id").is_some());

    let req = Request::get("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let res = common::send(&app, req).await;
    assert_eq!(res.headers.get("x-request-id").unwrap(), "req-42");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = common::provider().await;
    let app = common::app(&common::config(&server));

    assert_eq!(get(&app, "/api/nope", None).await.status, StatusCode::NOT_FOUND);
}
