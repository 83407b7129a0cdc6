use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored vision-model analysis of one attachment (one-to-one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: Uuid,
    pub attachment_id: Uuid,
    pub modality: String,
    pub findings: String,
    pub impression: String,
    pub model_version: Option<String>,
    pub created_at: NaiveDateTime,
}
