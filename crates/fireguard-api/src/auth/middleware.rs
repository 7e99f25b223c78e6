// Authentication guard and identity extractor
// Decision: The guard runs as route middleware; handlers read the identity from request extensions
// Decision: Invalid tokens are a client error (401, debug log), key discovery failures a server error (503)

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::firebase::{FirebaseAuth, VerifyError};

/// Authentication error
#[derive(Debug, Clone, Serialize)]
pub struct AuthError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl AuthError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn internal(message: &str) -> Self {
        Self {
            error: message.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Token verification failed");
                AuthError::unauthorized("Invalid or expired token")
            }
            VerifyError::KeyDiscovery(e) => {
                tracing::error!(error = %e, "Signing key discovery failed");
                AuthError::service_unavailable("Token verification temporarily unavailable")
            }
        }
    }
}

/// Identity resolved from a verified ID token.
///
/// Serializes as a flat object: `uid` followed by every decoded claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    /// Firebase user id (the token subject)
    pub uid: String,
    /// Decoded token claims
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl AuthUser {
    /// Build from decoded claims; `None` when `sub` is missing or not a string
    pub fn from_claims(mut claims: Map<String, Value>) -> Option<Self> {
        let uid = claims.get("sub")?.as_str()?.to_string();
        // `uid` is derived from `sub` and must not be shadowed by a claim
        claims.remove("uid");
        Some(Self { uid, claims })
    }

    /// Sign-in method recorded by Firebase (`password`, `google.com`, ...)
    pub fn sign_in_provider(&self) -> Option<&str> {
        self.claims
            .get("firebase")
            .and_then(|f| f.get("sign_in_provider"))
            .and_then(Value::as_str)
    }
}

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub firebase: Arc<FirebaseAuth>,
}

impl AuthState {
    pub fn new(firebase: FirebaseAuth) -> Self {
        Self {
            firebase: Arc::new(firebase),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::unauthorized("Authentication required"))?;

    let value = value
        .to_str()
        .map_err(|_| AuthError::unauthorized("Invalid authorization header"))?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::unauthorized("Bearer token required"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::unauthorized("Bearer token required"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::unauthorized("Bearer token required"));
    }

    Ok(token)
}

/// Guard for protected routes.
///
/// Verifies the bearer token and binds the resolved [`AuthUser`] to the
/// request. Requests without a valid token never reach the handler.
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers())
        .map_err(|e| {
            tracing::debug!(reason = %e.error, "Rejected request without bearer token");
            e
        })?
        .to_string();

    let user = auth.firebase.verify(&token).await?;
    tracing::debug!(
        uid = %user.uid,
        provider = user.sign_in_provider().unwrap_or("unknown"),
        "Authenticated request"
    );

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Extractor for the identity bound by [`require_auth`]
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            tracing::error!("AuthUser requested on a route without the authentication guard");
            AuthError::internal("Authentication guard not configured for this route")
        })
    }
}
