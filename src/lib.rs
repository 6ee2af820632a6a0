pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod retention;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{start_api_server, ApiContext};
use crate::config::AppConfig;
use crate::db::Database;
use crate::pipeline::generation::OllamaClient;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),

    #[error("Generation client error: {0}")]
    Generation(#[from] pipeline::generation::GenerationError),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Initialize tracing from `RUST_LOG`, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Start the service and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Missing .env is normal; the environment alone is enough.
    let _ = dotenvy::dotenv();
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    if !config::is_loopback_endpoint(&config.generation.base_url) {
        tracing::warn!(
            url = %config.generation.base_url,
            "Generation endpoint is not on this machine; prompts contain patient data"
        );
    }

    let db = Database::open(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "Database ready");

    let generator = Arc::new(OllamaClient::new(&config.generation.base_url)?);
    tracing::info!(
        url = %config.generation.base_url,
        model = %config.generation.model,
        "Generation client configured"
    );

    let retention = retention::start_retention_task(db.clone(), config.retention.clone());
    let ctx = ApiContext::new(db, generator, &config);
    let mut server = start_api_server(ctx, config.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    tracing::info!("Shutting down");

    server.shutdown();
    server.stopped().await;
    retention.shutdown().await;
    Ok(())
}
