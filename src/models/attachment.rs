use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded file. Linked to a visit, a chat session, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub visit_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub file_path: PathBuf,
    pub name: String,
    pub uploaded_at: NaiveDateTime,
}
