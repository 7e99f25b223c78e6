// Health check (unauthenticated)

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

/// State for health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub environment: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
}

pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment.clone(),
    })
}
