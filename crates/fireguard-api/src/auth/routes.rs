// Authenticated identity routes

use axum::{middleware, routing::get, Json, Router};

use super::middleware::{require_auth, AuthState, AuthUser};

/// Routes under `/auth`, all behind the authentication guard
pub fn routes(state: AuthState) -> Router {
    Router::new()
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// GET /auth/me - Identity asserted by the bearer token
async fn me(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}
