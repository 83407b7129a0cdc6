use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{
    enum_column, format_timestamp, optional_uuid_column, row_error, timestamp_column, uuid_column,
};
use crate::db::DatabaseError;
use crate::models::{ChatMessage, ChatSession};

const SESSION_COLUMNS: &str =
    "id, patient_id, name, summary, cached_message_count, created_at, updated_at";

pub fn insert_chat_session(conn: &Connection, session: &ChatSession) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO chat_sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            session.id.to_string(),
            session.patient_id.to_string(),
            session.name,
            session.summary,
            session.cached_message_count as i64,
            format_timestamp(&session.created_at),
            format_timestamp(&session.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_chat_session(conn: &Connection, id: &Uuid) -> Result<Option<ChatSession>, DatabaseError> {
    let session = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"),
            params![id.to_string()],
            row_to_session,
        )
        .optional()?;
    Ok(session)
}

/// Most recently updated session of a patient.
pub fn get_latest_chat_session(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<ChatSession>, DatabaseError> {
    let session = conn
        .query_row(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM chat_sessions
                 WHERE patient_id = ?1
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![patient_id.to_string()],
            row_to_session,
        )
        .optional()?;
    Ok(session)
}

/// Delete a session and, by cascade, its messages.
pub fn delete_chat_session(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM chat_sessions WHERE id = ?1",
        params![id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ChatSession".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn touch_chat_session(
    conn: &Connection,
    id: &Uuid,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
        params![format_timestamp(at), id.to_string()],
    )?;
    Ok(())
}

/// Store a summary computed over `new_count` turns, but only if the cache
/// still reflects `expected_count`. Returns false when another writer won.
pub fn update_session_summary(
    conn: &Connection,
    id: &Uuid,
    summary: &str,
    expected_count: usize,
    new_count: usize,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "UPDATE chat_sessions
         SET summary = ?1, cached_message_count = ?2, updated_at = ?3
         WHERE id = ?4 AND cached_message_count = ?5",
        params![
            summary,
            new_count as i64,
            format_timestamp(&Local::now().naive_local()),
            id.to_string(),
            expected_count as i64,
        ],
    )?;
    Ok(affected == 1)
}

pub fn insert_chat_message(conn: &Connection, msg: &ChatMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (id, session_id, sender, text, attachment_id, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            msg.id.to_string(),
            msg.session_id.to_string(),
            msg.sender.as_str(),
            msg.text,
            msg.attachment_id.map(|id| id.to_string()),
            format_timestamp(&msg.timestamp),
        ],
    )?;
    Ok(())
}

/// Messages of a session in chronological order.
pub fn get_chat_messages(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Vec<ChatMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, sender, text, attachment_id, timestamp
         FROM chat_messages WHERE session_id = ?1
         ORDER BY timestamp ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        Ok(ChatMessage {
            id: uuid_column(row, 0)?,
            session_id: uuid_column(row, 1)?,
            sender: enum_column(row, 2)?,
            text: row.get(3)?,
            attachment_id: optional_uuid_column(row, 4)?,
            timestamp: timestamp_column(row, 5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(row_error)
}

#[cfg(test)]
pub(crate) fn count_chat_messages(conn: &Connection, session_id: &Uuid) -> Result<usize, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
        params![session_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn row_to_session(row: &rusqlite::Row) -> Result<ChatSession, rusqlite::Error> {
    let cached: i64 = row.get(4)?;
    Ok(ChatSession {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        name: row.get(2)?,
        summary: row.get(3)?,
        cached_message_count: cached.max(0) as usize,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}
