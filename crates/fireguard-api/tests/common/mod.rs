// Shared fixtures for integration tests
// The fixture key pair stands in for a Firebase project: the private key is the
// service-account key, jwks.json publishes its public half under KID.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use fireguard_api::api::{self, HealthState};
use fireguard_api::auth::{AuthState, FirebaseAuth, FirebaseConfig, KeySource, ServiceCredential};
use fireguard_api::config::ConfigService;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");
pub const UNTRUSTED_KEY: &str = include_str!("../fixtures/untrusted_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KID: &str = "fixture-key-1";
pub const PROJECT_ID: &str = "demo-project";
pub const CLIENT_EMAIL: &str = "firebase-adminsdk@demo-project.iam.gserviceaccount.com";

/// Environment as a deployment platform would inject it: the PEM key on one line
pub fn fixture_env() -> Vec<(String, String)> {
    vec![
        ("NODE_ENV".to_string(), "test".to_string()),
        ("CLIENT_EMAIL".to_string(), CLIENT_EMAIL.to_string()),
        (
            "PRIVATE_FIREBASE_KEY".to_string(),
            PRIVATE_KEY.replace('\n', "\\n"),
        ),
        ("PROJECT_ADMIN_ID".to_string(), PROJECT_ID.to_string()),
    ]
}

pub fn credential() -> ServiceCredential {
    let config = ConfigService::from_vars(fixture_env());
    ServiceCredential::from_config(&config).expect("fixture credential")
}

pub fn firebase(keys: Arc<dyn KeySource>) -> FirebaseAuth {
    FirebaseAuth::new(FirebaseConfig::new(credential()), keys).expect("fixture Firebase config")
}

pub fn app(keys: Arc<dyn KeySource>) -> Router {
    api::router(
        AuthState::new(firebase(keys)),
        HealthState {
            environment: "test".to_string(),
        },
    )
}

pub fn claims(uid: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": format!("https://securetoken.google.com/{}", PROJECT_ID),
        "aud": PROJECT_ID,
        "sub": uid,
        "user_id": uid,
        "iat": now - 30,
        "auth_time": now - 30,
        "exp": now + 3600,
        "email": "user@example.com",
        "email_verified": true,
        "firebase": {
            "identities": { "email": ["user@example.com"] },
            "sign_in_provider": "password"
        }
    })
}

pub fn sign_with(claims: &Value, pem: &str) -> String {
    sign_with_kid(claims, pem, KID)
}

pub fn sign_with_kid(claims: &Value, pem: &str, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("token encoding")
}

pub fn mint_token(uid: &str) -> String {
    sign_with(&claims(uid), PRIVATE_KEY)
}

/// Send `GET /auth/me` with an optional raw `Authorization` value
pub async fn get_me(app: Router, authorization: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri("/auth/me");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }

    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, body)
}
