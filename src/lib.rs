pub mod api; // HTTP API over the pipeline
pub mod config;
pub mod core_state;
pub mod models;
pub mod pipeline; // Submission & Confirmation Pipeline
pub mod registry; // Registry protocol boundary

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Registry client error: {0}")]
    Registry(#[from] registry::TransportError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load configuration, start the API server and run until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("vaxsubmit starting v{}", config::APP_VERSION);

    let app_config = config::AppConfig::from_env()?;
    tracing::info!(
        registry = %app_config.registry.base_url,
        max_encounters = app_config.pipeline.limits.max_encounters_per_request,
        max_episodes = app_config.pipeline.limits.max_episodes_per_request,
        concurrency = app_config.pipeline.dispatch_concurrency,
        "Configuration loaded"
    );

    let bind_addr = app_config.bind_addr;
    let core = Arc::new(core_state::CoreState::from_config(app_config)?);
    let mut server = api::start_api_server(core, bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.stopped().await;
    Ok(())
}
