use chrono::Local;
use rusqlite::Connection;
use uuid::Uuid;

use super::IntakeError;
use crate::chat::{generate_title, list_session_summaries, SessionSummary};
use crate::db::repository;
use crate::models::{ChatMessage, ChatSession, MessageSender};

/// Manages chat session lifecycle and message persistence.
pub struct SessionManager<'a> {
    conn: &'a Connection,
}

impl<'a> SessionManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Pick the session a chat message belongs to.
    ///
    /// - explicit id of one of the patient's sessions: that session;
    /// - explicit id that is unknown (or another patient's): a new session;
    /// - no id: the patient's most recently updated session, or a new one.
    ///
    /// New sessions are titled from `first_message`.
    pub fn resolve_session(
        &self,
        patient_id: Uuid,
        session_id: Option<Uuid>,
        first_message: &str,
    ) -> Result<ChatSession, IntakeError> {
        let existing = match session_id {
            Some(id) => repository::get_chat_session(self.conn, &id)?
                .filter(|s| s.patient_id == patient_id),
            None => repository::get_latest_chat_session(self.conn, &patient_id)?,
        };
        match existing {
            Some(session) => Ok(session),
            None => {
                if let Some(id) = session_id {
                    tracing::info!(session_id = %id, "Requested session not found, starting a new one");
                }
                self.start(patient_id, Some(first_message))
            }
        }
    }

    /// Start a new session for a patient.
    pub fn start(&self, patient_id: Uuid, name: Option<&str>) -> Result<ChatSession, IntakeError> {
        if repository::get_patient(self.conn, &patient_id)?.is_none() {
            return Err(IntakeError::PatientNotFound(patient_id));
        }
        let now = Local::now().naive_local();
        let session = ChatSession {
            id: Uuid::new_v4(),
            patient_id,
            name: generate_title(name.unwrap_or_default()),
            summary: None,
            cached_message_count: 0,
            created_at: now,
            updated_at: now,
        };
        repository::insert_chat_session(self.conn, &session)?;
        Ok(session)
    }

    /// Append one turn and bump the session's `updated_at`.
    pub fn append_turn(
        &self,
        session_id: Uuid,
        sender: MessageSender,
        text: &str,
        attachment_id: Option<Uuid>,
    ) -> Result<ChatMessage, IntakeError> {
        let msg = ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            sender,
            text: text.to_string(),
            attachment_id,
            timestamp: Local::now().naive_local(),
        };
        repository::insert_chat_message(self.conn, &msg)?;
        repository::touch_chat_session(self.conn, &session_id, &msg.timestamp)?;
        Ok(msg)
    }

    pub fn get(&self, session_id: Uuid) -> Result<ChatSession, IntakeError> {
        repository::get_chat_session(self.conn, &session_id)?
            .ok_or(IntakeError::SessionNotFound(session_id))
    }

    /// Messages of a session in chronological order.
    pub fn history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, IntakeError> {
        self.get(session_id)?;
        Ok(repository::get_chat_messages(self.conn, &session_id)?)
    }

    /// A patient's sessions with message counts and previews, most recent first.
    pub fn summaries(&self, patient_id: Uuid) -> Result<Vec<SessionSummary>, IntakeError> {
        if repository::get_patient(self.conn, &patient_id)?.is_none() {
            return Err(IntakeError::PatientNotFound(patient_id));
        }
        Ok(list_session_summaries(self.conn, &patient_id)?)
    }

    /// Delete a session together with all of its messages.
    pub fn delete(&self, session_id: Uuid) -> Result<(), IntakeError> {
        match repository::delete_chat_session(self.conn, &session_id) {
            Err(crate::db::DatabaseError::NotFound { .. }) => {
                Err(IntakeError::SessionNotFound(session_id))
            }
            other => Ok(other?),
        }
    }
}
