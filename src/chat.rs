//! Chat session views and helpers for the intake assistant.
//!
//! Builds on top of:
//! - `models::ChatSession` / `models::ChatMessage` (data structs)
//! - `intake::session::SessionManager` (lifecycle)
//! - `db::repository` (low-level insert/query)
//!
//! This module adds the client-facing list types and title generation.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::format_timestamp;
use crate::db::DatabaseError;
use crate::models::{ChatMessage, ChatSession};

/// Fallback title for sessions started without any text.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 50;

// ═══════════════════════════════════════════
// Client-facing types
// ═══════════════════════════════════════════

/// Session row for the chat history sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: u32,
    pub last_message_preview: String,
    pub has_summary: bool,
}

/// Stored message as shown in the chat pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub attachment_id: Option<String>,
    pub timestamp: String,
}

impl From<ChatMessage> for MessageView {
    fn from(m: ChatMessage) -> Self {
        MessageView {
            id: m.id.to_string(),
            sender: m.sender.as_str().to_string(),
            text: m.text,
            attachment_id: m.attachment_id.map(|id| id.to_string()),
            timestamp: format_timestamp(&m.timestamp),
        }
    }
}

/// A session that has no messages yet, e.g. one just created.
impl From<ChatSession> for SessionSummary {
    fn from(s: ChatSession) -> Self {
        SessionSummary {
            id: s.id.to_string(),
            name: s.name,
            created_at: format_timestamp(&s.created_at),
            updated_at: format_timestamp(&s.updated_at),
            message_count: 0,
            last_message_preview: String::new(),
            has_summary: s.summary.is_some(),
        }
    }
}

// ═══════════════════════════════════════════
// Title generation
// ═══════════════════════════════════════════

/// Generate a session title from the first parent message.
/// Truncates at 50 characters with "..." if longer.
pub fn generate_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return DEFAULT_SESSION_TITLE.to_string();
    }

    match trimmed.char_indices().nth(TITLE_MAX_CHARS) {
        Some((boundary, _)) => format!("{}...", &trimmed[..boundary]),
        None => trimmed.to_string(),
    }
}

// ═══════════════════════════════════════════
// Repository functions
// ═══════════════════════════════════════════

/// List a patient's sessions with derived message fields, most recently updated first.
pub fn list_session_summaries(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<SessionSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT
            s.id,
            s.name,
            s.created_at,
            s.updated_at,
            COUNT(m.id) AS message_count,
            COALESCE(
                (SELECT SUBSTR(m2.text, 1, 80) FROM chat_messages m2
                 WHERE m2.session_id = s.id
                 ORDER BY m2.timestamp DESC, m2.rowid DESC LIMIT 1),
                ''
            ) AS last_message_preview,
            s.summary IS NOT NULL AS has_summary
         FROM chat_sessions s
         LEFT JOIN chat_messages m ON m.session_id = s.id
         WHERE s.patient_id = ?1
         GROUP BY s.id
         ORDER BY s.updated_at DESC, s.rowid DESC",
    )?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(SessionSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            message_count: row.get::<_, i64>(4)? as u32,
            last_message_preview: row.get(5)?,
            has_summary: row.get(6)?,
        })
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(row?);
    }
    Ok(summaries)
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
