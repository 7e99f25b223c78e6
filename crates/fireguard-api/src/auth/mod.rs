// Authentication module
// Decision: Single provider (Firebase ID tokens), bearer header only
// Decision: Guard is stateless across requests; only the signing-key cache is shared

pub mod config;
pub mod firebase;
pub mod jwks;
pub mod middleware;
pub mod routes;

pub use config::{FirebaseConfig, ServiceCredential};
pub use firebase::{CredentialInitError, FirebaseAuth, VerifyError};
pub use jwks::{JwksClient, KeyDiscoveryError, KeySource, StaticKeySource};
pub use middleware::{require_auth, AuthError, AuthState, AuthUser};
pub use routes::routes;
