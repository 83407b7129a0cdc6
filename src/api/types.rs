//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::intake::ConversationTurn;

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct SummarizeBody {
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<Uuid>,
}

/// Body of every request scoped to a single patient.
#[derive(Debug, Deserialize)]
pub struct PatientBody {
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentBody {
    #[serde(alias = "attachmentId")]
    pub attachment_id: Uuid,
}

/// Clinician correction of a stored scan finding. Omitted fields are kept.
#[derive(Debug, Deserialize)]
pub struct ScanUpdateBody {
    #[serde(alias = "attachmentId")]
    pub attachment_id: Uuid,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub findings: Option<String>,
    #[serde(default)]
    pub impression: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionBody {
    #[serde(alias = "sessionId")]
    pub session_id: Uuid,
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
    pub session_id: Uuid,
}
