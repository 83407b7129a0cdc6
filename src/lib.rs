pub mod api;
pub mod chat; // Session list views and titles
pub mod config;
pub mod core_state;
pub mod db;
pub mod intake; // LLM-assisted intake
pub mod models;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("State initialization failed: {0}")]
    State(#[from] core_state::CoreError),
    #[error("Cannot start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Server error: {0}")]
    Server(String),
}

/// Start the HTTP server and block until Ctrl-C.
///
/// State (including the blocking HTTP client used for model calls) is
/// built before the tokio runtime exists.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = config::ServerConfig::from_env()?;
    let ai_config = config::AiConfig::from_env()?;

    let core = Arc::new(core_state::CoreState::new(
        server_config.db_path.clone(),
        &ai_config,
    )?);

    // Fail fast on an unwritable path or a broken schema.
    drop(core.open_db()?);
    tracing::info!(db_path = %server_config.db_path.display(), "Database ready");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(api::server::serve_until_ctrl_c(core, server_config.bind_addr))
        .map_err(StartupError::Server)
}
