// HTTP surface: route assembly and cross-cutting layers

pub mod health;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthState};
use crate::config::ServerConfig;
pub use health::HealthState;

/// Application routes without transport layers
pub fn router(auth_state: AuthState, health_state: HealthState) -> Router {
    Router::new()
        .merge(health::routes(health_state))
        .merge(auth::routes(auth_state))
}

/// Wrap `app` with CORS (when origins are configured) and request tracing
pub fn with_layers(app: Router, server: &ServerConfig) -> Router {
    let cors_origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let app = if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::ORIGIN])
                .allow_credentials(true),
        )
    };

    app.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn test_routes() -> Router {
        Router::new().route("/v1/test", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn test_cors_headers_for_allowed_origin() {
        let server = ServerConfig {
            cors_allowed_origins: vec!["https://app.example.com".to_string()],
            ..Default::default()
        };
        let app = with_layers(test_routes(), &server);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/test")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_no_cors_headers_by_default() {
        let app = with_layers(test_routes(), &ServerConfig::default());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/test")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
