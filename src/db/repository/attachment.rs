use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, optional_uuid_column, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::Attachment;

pub fn insert_attachment(conn: &Connection, att: &Attachment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO attachments (id, visit_id, session_id, file_path, name, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            att.id.to_string(),
            att.visit_id.map(|id| id.to_string()),
            att.session_id.map(|id| id.to_string()),
            att.file_path.to_string_lossy(),
            att.name,
            format_timestamp(&att.uploaded_at),
        ],
    )?;
    Ok(())
}

pub fn get_attachment(conn: &Connection, id: &Uuid) -> Result<Option<Attachment>, DatabaseError> {
    let attachment = conn
        .query_row(
            "SELECT id, visit_id, session_id, file_path, name, uploaded_at
             FROM attachments WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let path: String = row.get(3)?;
                Ok(Attachment {
                    id: uuid_column(row, 0)?,
                    visit_id: optional_uuid_column(row, 1)?,
                    session_id: optional_uuid_column(row, 2)?,
                    file_path: PathBuf::from(path),
                    name: row.get(4)?,
                    uploaded_at: timestamp_column(row, 5)?,
                })
            },
        )
        .optional()?;
    Ok(attachment)
}
