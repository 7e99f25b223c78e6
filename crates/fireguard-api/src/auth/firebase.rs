// Firebase ID token verification
// Decision: Verify tokens locally (RS256 against Google's published keys), no admin API round trip
// Decision: The service credential is validated once at startup and is immutable afterwards

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, EncodingKey, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::config::{FirebaseConfig, ServiceCredential};
use super::jwks::{KeyDiscoveryError, KeySource};
use super::middleware::AuthUser;

/// Longest `sub` Firebase accepts
const MAX_UID_LENGTH: usize = 128;

/// Service credential rejected at startup
#[derive(Debug, thiserror::Error)]
pub enum CredentialInitError {
    #[error("service credential field {0} is empty")]
    MissingField(&'static str),

    #[error("service credential client email {0:?} is not an email address")]
    InvalidClientEmail(String),

    #[error("service credential private key is not a valid RSA PEM key: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),
}

/// Token verification failure
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Malformed, expired, wrongly signed or issued for another project
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Signing keys could not be obtained; not the caller's fault
    #[error("signing key discovery failed: {0}")]
    KeyDiscovery(#[from] KeyDiscoveryError),
}

fn invalid(reason: impl Into<String>) -> VerifyError {
    VerifyError::InvalidToken(reason.into())
}

/// Verifies Firebase ID tokens for a single project
pub struct FirebaseAuth {
    credential: ServiceCredential,
    issuer: String,
    validation: Validation,
    leeway_secs: i64,
    keys: Arc<dyn KeySource>,
}

impl FirebaseAuth {
    /// Validate the service credential and build the verifier.
    ///
    /// Fails when a credential field is empty, the client email is not an
    /// address, or the private key is not an RSA PEM key.
    pub fn new(
        config: FirebaseConfig,
        keys: Arc<dyn KeySource>,
    ) -> Result<Self, CredentialInitError> {
        validate_credential(&config.credential)?;

        let issuer = config.issuer();
        let project_id = config.credential.project_id.clone();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id.as_str()]);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
        validation.validate_exp = true;
        validation.leeway = config.clock_skew.as_secs();

        Ok(Self {
            credential: config.credential,
            issuer,
            validation,
            leeway_secs: i64::try_from(config.clock_skew.as_secs()).unwrap_or(i64::MAX),
            keys,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.credential.project_id
    }

    pub fn client_email(&self) -> &str {
        &self.credential.client_email
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify a Firebase ID token and return the identity it asserts
    pub async fn verify(&self, token: &str) -> Result<AuthUser, VerifyError> {
        let header =
            decode_header(token).map_err(|e| invalid(format!("malformed token: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            return Err(invalid(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| invalid("token header has no key id"))?;

        let key = self.decoding_key(&kid).await?;

        let data = decode::<Map<String, Value>>(token, &key, &self.validation)
            .map_err(|e| invalid(e.to_string()))?;

        let claims = data.claims;
        self.check_firebase_claims(&claims)?;
        AuthUser::from_claims(claims).ok_or_else(|| invalid("token has no subject"))
    }

    /// Key matching `kid`; an unknown id triggers one refresh
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        let keys = self.keys.keys().await?;
        let jwk = match keys.find(kid) {
            Some(jwk) => jwk.clone(),
            None => {
                tracing::debug!(kid = %kid, "Unknown signing key id, refreshing keys");
                let keys = self.keys.refresh().await?;
                keys.find(kid)
                    .cloned()
                    .ok_or_else(|| invalid(format!("no signing key matches key id {}", kid)))?
            }
        };

        DecodingKey::from_jwk(&jwk).map_err(|e| {
            VerifyError::KeyDiscovery(KeyDiscoveryError::Parse(format!(
                "unusable key {}: {}",
                kid, e
            )))
        })
    }

    fn check_firebase_claims(&self, claims: &Map<String, Value>) -> Result<(), VerifyError> {
        let sub = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("token subject is not a string"))?;
        if sub.is_empty() {
            return Err(invalid("token subject is empty"));
        }
        if sub.chars().count() > MAX_UID_LENGTH {
            return Err(invalid("token subject is longer than 128 characters"));
        }

        let latest = Utc::now().timestamp().saturating_add(self.leeway_secs);

        let iat = claims
            .get("iat")
            .and_then(Value::as_i64)
            .ok_or_else(|| invalid("token has no issued-at time"))?;
        if iat > latest {
            return Err(invalid("token issued in the future"));
        }

        if let Some(auth_time) = claims.get("auth_time") {
            let auth_time = auth_time
                .as_i64()
                .ok_or_else(|| invalid("token auth_time is not a timestamp"))?;
            if auth_time > latest {
                return Err(invalid("token authentication time is in the future"));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuth")
            .field("credential", &self.credential)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

fn validate_credential(credential: &ServiceCredential) -> Result<(), CredentialInitError> {
    if credential.client_email.trim().is_empty() {
        return Err(CredentialInitError::MissingField("client_email"));
    }
    if credential.private_key.trim().is_empty() {
        return Err(CredentialInitError::MissingField("private_key"));
    }
    if credential.project_id.trim().is_empty() {
        return Err(CredentialInitError::MissingField("project_id"));
    }

    let (local, domain) = credential
        .client_email
        .split_once('@')
        .ok_or_else(|| CredentialInitError::InvalidClientEmail(credential.client_email.clone()))?;
    if local.is_empty() || domain.is_empty() {
        return Err(CredentialInitError::InvalidClientEmail(
            credential.client_email.clone(),
        ));
    }

    EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
        .map_err(CredentialInitError::InvalidPrivateKey)?;

    Ok(())
}
