//! Exercises `PlexClient` against a local stand-in for plex.tv.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use plex_forward_auth_plex::{AccessTier, AuthToken, IdentityProvider, PlexClient, PlexConfig};
use serde_json::{Value, json};

fn has_client_headers(headers: &HeaderMap) -> bool {
    headers.get("accept").is_some_and(|v| v == "application/json")
        && headers.get("x-plex-product").is_some_and(|v| v == "test-product")
        && headers
            .get("x-plex-client-identifier")
            .is_some_and(|v| v == "test-client")
}

fn has_token(headers: &HeaderMap) -> bool {
    headers.get("x-plex-token").is_some_and(|v| v == "token-abc")
}

async fn create_pin(
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
) -> (StatusCode, Json<Value>) {
    let strong = query.iter().any(|(k, v)| k == "strong" && v == "true");
    if !has_client_headers(&headers) || !strong {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    }
    (StatusCode::CREATED, Json(json!({"id": 4242, "code": "pin-code"})))
}

async fn check_pin(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match id.as_str() {
        "4242" => (StatusCode::OK, Json(json!({"id": 4242, "authToken": "token-abc"}))),
        "1" => (StatusCode::OK, Json(json!({"id": 1, "authToken": null}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_client_headers(&headers) || !has_token(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (StatusCode::OK, Json(json!({"id": 7, "email": "viewer@example.com"})))
}

async fn resources(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !has_token(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!([])));
    }
    (
        StatusCode::OK,
        Json(json!([
            {"name": "den", "clientIdentifier": "srv-home", "owned": false, "home": true},
            {"name": "mine", "clientIdentifier": "srv-owned", "owned": true},
            {"name": "friend", "clientIdentifier": "srv-shared"}
        ])),
    )
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"id": 1, "code": "late"}))
}

async fn spawn_fake_plex() -> SocketAddr {
    let app = Router::new()
        .route("/api/v2/pins", post(create_pin))
        .route("/api/v2/pins/{id}", get(check_pin))
        .route("/api/v2/user", get(user))
        .route("/api/v2/resources", get(resources))
        .route("/slow/pins", post(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn client(addr: SocketAddr) -> PlexClient {
    PlexClient::new(
        PlexConfig::new("test-product", "test-client")
            .with_api_base(format!("http://{addr}/api/v2/")),
    )
    .expect("client")
}

#[tokio::test]
async fn full_pin_flow() {
    let addr = spawn_fake_plex().await;
    let client = client(addr);

    let pin = client.create_pin().await.expect("pin");
    assert_eq!(pin.id, "4242");
    assert_eq!(pin.code, "pin-code");

    let token = client.exchange_token(&pin.id).await.expect("token");
    assert_eq!(token.expose(), "token-abc");

    let email = client.fetch_user(&token).await.expect("user");
    assert_eq!(email.as_str(), "viewer@example.com");
}

#[tokio::test]
async fn unclaimed_pin_is_an_error() {
    let addr = spawn_fake_plex().await;
    let err = client(addr).exchange_token("1").await.unwrap_err();
    assert!(err.to_string().contains("has not been authorized"));
}

#[tokio::test]
async fn error_status_is_reported() {
    let addr = spawn_fake_plex().await;
    let err = client(addr).exchange_token("999").await.unwrap_err();
    assert!(err.to_string().contains("404"));

    let err = client(addr)
        .fetch_user(&AuthToken::new("wrong"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn access_tiers_from_resources() {
    let addr = spawn_fake_plex().await;
    let client = client(addr);
    let token = AuthToken::new("token-abc");

    for (server, tier) in [
        ("srv-owned", AccessTier::Owner),
        ("srv-home", AccessTier::HomeUser),
        ("srv-shared", AccessTier::NormalUser),
        ("srv-missing", AccessTier::NoAccess),
    ] {
        assert_eq!(
            client.fetch_access_tier(&token, server).await.expect("tier"),
            tier,
            "{server}"
        );
    }
}

#[tokio::test]
async fn requests_time_out() {
    let addr = spawn_fake_plex().await;
    let client = PlexClient::new(
        PlexConfig::new("test-product", "test-client")
            .with_api_base(format!("http://{addr}/slow/"))
            .with_timeout(Duration::from_millis(200)),
    )
    .expect("client");

    assert!(client.create_pin().await.is_err());
}

#[tokio::test]
async fn unreachable_provider_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    assert!(client(addr).create_pin().await.is_err());
}
