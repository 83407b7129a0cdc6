//! LLM-assisted intake: prompt assembly, scan analysis, visit summaries
//! and the chat flow that ties them to stored patient records.

pub mod context;
pub mod extract;
pub mod gemini;
pub mod llm;
pub mod locks;
pub mod orchestrator;
pub mod prompt;
pub mod scan;
pub mod session;
pub mod summarizer;
pub mod types;

pub use context::*;
pub use extract::*;
pub use gemini::*;
pub use llm::*;
pub use locks::*;
pub use orchestrator::*;
pub use scan::*;
pub use session::*;
pub use summarizer::*;
pub use types::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("AI model is not configured: {0}")]
    NotConfigured(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("Chat session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(Uuid),

    #[error("Attachment file is missing: {0}")]
    AttachmentFileMissing(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Cannot reach model endpoint: {0}")]
    UpstreamConnection(String),

    #[error("Model endpoint returned error (status {status}): {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntakeError {
    /// Errors raised by the model call itself rather than by local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamConnection(_)
                | Self::UpstreamStatus { .. }
                | Self::Timeout(_)
                | Self::MalformedResponse(_)
        )
    }

    /// Whether the same request may succeed if simply repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::UpstreamConnection(_) => true,
            Self::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
