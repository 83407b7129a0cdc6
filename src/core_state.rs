//! Application state shared by every request handler.
//!
//! Owns the database location, the model client and the intake lock
//! tables. Each unit of work opens its own SQLite connection.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AiConfig;
use crate::db;
use crate::intake::{GeminiClient, IntakeError, IntakeLocks, LlmClient, ModelSettings};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

/// Wrapped in `Arc` at startup and cloned into the HTTP layer.
pub struct CoreState {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Model names used per intake task.
    pub models: ModelSettings,
    /// `None` when no API key is configured.
    llm: Option<Arc<dyn LlmClient>>,
    /// Per-attachment and per-session mutexes.
    pub locks: Arc<IntakeLocks>,
}

impl CoreState {
    /// Build state from configuration, constructing the Gemini client
    /// when an API key is present.
    pub fn new(db_path: PathBuf, ai: &AiConfig) -> Result<Self, CoreError> {
        let llm: Option<Arc<dyn LlmClient>> = match ai.api_key.as_deref() {
            Some(key) => {
                let client = GeminiClient::new(key, ai.timeout_secs)?;
                tracing::info!(chat_model = %ai.models.chat_model, "Gemini client ready");
                Some(Arc::new(client) as Arc<dyn LlmClient>)
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, AI endpoints will be unavailable");
                None
            }
        };
        Ok(Self::with_client(db_path, ai.models.clone(), llm))
    }

    /// Build state around an explicit client (tests, alternative backends).
    pub fn with_client(
        db_path: PathBuf,
        models: ModelSettings,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        Self {
            db_path,
            models,
            llm,
            locks: Arc::new(IntakeLocks::default()),
        }
    }

    /// Open a database connection, running pending migrations.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    /// The configured model client.
    pub fn llm(&self) -> Result<Arc<dyn LlmClient>, CoreError> {
        self.llm.clone().ok_or(CoreError::AiNotConfigured)
    }

    pub fn ai_configured(&self) -> bool {
        self.llm.is_some()
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("AI model is not configured")]
    AiNotConfigured,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Model client error: {0}")]
    Intake(#[from] IntakeError),
}
