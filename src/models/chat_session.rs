use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MessageSender;

/// A patient chat thread with its cached visit summary.
///
/// `summary` is reusable verbatim only while `cached_message_count`
/// equals the current number of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub summary: Option<String>,
    pub cached_message_count: usize,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender: MessageSender,
    pub text: String,
    pub attachment_id: Option<Uuid>,
    pub timestamp: NaiveDateTime,
}
