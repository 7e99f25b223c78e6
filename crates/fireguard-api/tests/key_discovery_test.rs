// Integration tests for signing-key discovery through the full router
// A wiremock server plays the Google JWKS endpoint.

mod common;

use axum::http::StatusCode;
use common::*;
use fireguard_api::auth::JwksClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jwks_json() -> Value {
    serde_json::from_str(JWKS).unwrap()
}

#[tokio::test]
async fn test_keys_discovered_and_cached_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("cache-control", "public, max-age=3600")
                .set_body_json(jwks_json()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let keys = JwksClient::new(
        format!("{}/jwk/securetoken", server.uri()),
        Duration::from_secs(60),
    )
    .unwrap();
    let app = app(Arc::new(keys));

    for uid in ["uid123", "uid456", "uid789"] {
        let token = mint_token(uid);
        let (status, body) = get_me(app.clone(), Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uid"], uid);
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(jwks_json()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let keys = JwksClient::new(
        format!("{}/jwk/securetoken", server.uri()),
        Duration::from_secs(600),
    )
    .unwrap();
    let app = app(Arc::new(keys));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let token = mint_token(&format!("uid{}", i));
            get_me(app, Some(&format!("Bearer {}", token))).await
        }));
    }

    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_unreachable_key_endpoint_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let keys = JwksClient::new(
        format!("{}/jwk/securetoken", server.uri()),
        Duration::from_secs(600),
    )
    .unwrap();

    let token = mint_token("uid123");
    let (status, body) = get_me(app(Arc::new(keys)), Some(&format!("Bearer {}", token))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.get("uid").is_none());
}

#[tokio::test]
async fn test_unknown_key_ids_rejected_without_refetch_storm() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let keys = JwksClient::new(
        format!("{}/jwk/securetoken", server.uri()),
        Duration::from_secs(600),
    )
    .unwrap();
    let app = app(Arc::new(keys));

    let token = mint_token("uid123");
    let (status, _) = get_me(app.clone(), Some(&format!("Bearer {}", token))).await;
    assert_eq!(status, StatusCode::OK);

    // Keys are cached, so unknown ids are invalid tokens rather than outages
    for i in 0..10 {
        let token = sign_with_kid(&claims("uid123"), PRIVATE_KEY, &format!("rotated-{}", i));
        let (status, body) = get_me(app.clone(), Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired token");
    }

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_token_does_not_touch_key_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwk/securetoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json()))
        .expect(0)
        .mount(&server)
        .await;

    let keys = JwksClient::new(
        format!("{}/jwk/securetoken", server.uri()),
        Duration::from_secs(600),
    )
    .unwrap();

    let (status, _) = get_me(app(Arc::new(keys)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
