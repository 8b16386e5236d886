use anyhow::{Context, Result};
use buckets::{
    config::AppConfig,
    routes::routes::{AppState, app},
    services::{access_gate::AccessGate, object_store::ObjectStore},
};
use std::{fs, io::ErrorKind, path::Path};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting buckets with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)
            .with_context(|| format!("creating storage directory {}", cfg.storage_dir))?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    let required = cfg
        .auth_requirements
        .iter()
        .filter(|(_, required)| *required)
        .count();
    if required > 0 && cfg.auth_keys.is_empty() {
        tracing::warn!(
            "{} operation kind(s) require authentication but no auth keys are configured; \
             those operations will always be denied",
            required
        );
    }

    // --- Initialize core services ---
    let store = ObjectStore::new(&cfg.storage_dir);
    let gate = AccessGate::new(cfg.auth_requirements.clone(), cfg.auth_keys.clone());

    // --- Build router ---
    let router = app(AppState::new(store, gate), cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err).with_context(|| format!("binding {}", addr)),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;

    Ok(())
}
