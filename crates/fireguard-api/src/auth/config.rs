// Firebase authentication configuration loaded from environment variables.
// Decision: Keep the legacy variable names (CLIENT_EMAIL, PRIVATE_FIREBASE_KEY, PROJECT_ADMIN_ID)
// Decision: Signing-key endpoint and issuer are overridable for emulator setups

use std::fmt;
use std::time::Duration;

use crate::config::{ConfigError, ConfigService};

/// Google endpoint publishing the public keys that sign Firebase ID tokens (JWK format)
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase ID tokens are issued by `<issuer base><project id>`
pub const DEFAULT_ISSUER_BASE: &str = "https://securetoken.google.com/";

const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 60 * 60;
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;

/// Service account credential for the Firebase project
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceCredential {
    pub client_email: String,
    /// PEM encoded private key (multi-line)
    pub private_key: String,
    pub project_id: String,
}

impl ServiceCredential {
    /// Read `CLIENT_EMAIL`, `PRIVATE_FIREBASE_KEY` and `PROJECT_ADMIN_ID`
    pub fn from_config(config: &ConfigService) -> Result<Self, ConfigError> {
        Ok(Self {
            client_email: config.require("CLIENT_EMAIL")?.trim().to_string(),
            private_key: config.require("PRIVATE_FIREBASE_KEY")?.to_string(),
            project_id: config.require("PROJECT_ADMIN_ID")?.trim().to_string(),
        })
    }
}

impl fmt::Debug for ServiceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Complete Firebase authentication configuration
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub credential: ServiceCredential,
    /// Signing-key discovery endpoint
    pub jwks_url: String,
    /// Key cache lifetime when the endpoint sends no `Cache-Control: max-age`
    pub jwks_cache_ttl: Duration,
    /// Prefix of the expected `iss` claim; the project id is appended
    pub issuer_base: String,
    /// Tolerance applied to `exp`, `iat` and `auth_time`
    pub clock_skew: Duration,
}

impl FirebaseConfig {
    /// Configuration with default endpoints for `credential`
    pub fn new(credential: ServiceCredential) -> Self {
        Self {
            credential,
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECS),
            issuer_base: DEFAULT_ISSUER_BASE.to_string(),
            clock_skew: Duration::from_secs(DEFAULT_CLOCK_SKEW_SECS),
        }
    }

    /// Load configuration from the environment snapshot
    pub fn from_config(config: &ConfigService) -> Result<Self, ConfigError> {
        let credential = ServiceCredential::from_config(config)?;

        let jwks_url = config
            .get("FIREBASE_JWKS_URL")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_JWKS_URL)
            .to_string();

        let issuer_base = config
            .get("FIREBASE_ISSUER_BASE")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ISSUER_BASE)
            .to_string();

        let jwks_cache_ttl = Duration::from_secs(
            config.get_parsed_or("FIREBASE_JWKS_CACHE_TTL", DEFAULT_JWKS_CACHE_TTL_SECS)?,
        );
        let clock_skew = Duration::from_secs(
            config.get_parsed_or("FIREBASE_CLOCK_SKEW", DEFAULT_CLOCK_SKEW_SECS)?,
        );

        Ok(Self {
            credential,
            jwks_url,
            jwks_cache_ttl,
            issuer_base,
            clock_skew,
        })
    }

    /// Expected `iss` claim for tokens of the configured project
    pub fn issuer(&self) -> String {
        format!("{}{}", self.issuer_base, self.credential.project_id)
    }
}
