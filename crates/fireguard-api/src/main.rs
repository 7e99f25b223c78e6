// Fireguard API server
// Decision: Explicit constructor wiring: config -> Firebase verifier -> guard -> routes
// Decision: Any configuration or credential problem aborts startup before serving traffic

use anyhow::{Context, Result};
use fireguard_api::api::{self, HealthState};
use fireguard_api::auth::{AuthState, FirebaseAuth, FirebaseConfig, JwksClient};
use fireguard_api::config::{ConfigService, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "fireguard_api=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so RUST_LOG may come from the env file
    let config = ConfigService::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            config
                .get("RUST_LOG")
                .and_then(|filter| EnvFilter::try_new(filter).ok())
                .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(environment = %config.node_env(), "fireguard-api starting...");
    match config.env_file() {
        Some(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
        None => tracing::debug!(environment = %config.node_env(), "No environment file found"),
    }

    let server_config =
        ServerConfig::from_config(&config).context("Invalid server configuration")?;

    // Firebase credential and signing-key discovery
    let firebase_config =
        FirebaseConfig::from_config(&config).context("Invalid Firebase configuration")?;
    let key_source = JwksClient::new(
        firebase_config.jwks_url.clone(),
        firebase_config.jwks_cache_ttl,
    )
    .context("Invalid signing key endpoint")?;
    tracing::info!(jwks_uri = %key_source.jwks_uri(), "Signing keys will be discovered from endpoint");
    let firebase = FirebaseAuth::new(firebase_config, Arc::new(key_source))
        .context("Failed to initialize Firebase credential")?;

    tracing::info!(
        project_id = %firebase.project_id(),
        client_email = %firebase.client_email(),
        issuer = %firebase.issuer(),
        "Firebase authentication configured"
    );

    let auth_state = AuthState::new(firebase);
    let health_state = HealthState {
        environment: config.node_env().to_string(),
    };

    let app = api::with_layers(api::router(auth_state, health_state), &server_config);

    // Start HTTP server
    let addr = server_config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
