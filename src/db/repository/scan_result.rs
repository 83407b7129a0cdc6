use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_timestamp, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::ScanResult;

const SCAN_COLUMNS: &str =
    "id, attachment_id, modality, findings, impression, model_version, created_at";

/// Insert unless the attachment already has a result.
/// Returns true when this call created the row.
pub fn insert_scan_result_if_absent(
    conn: &Connection,
    result: &ScanResult,
) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        &format!(
            "INSERT INTO scan_results ({SCAN_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(attachment_id) DO NOTHING"
        ),
        params![
            result.id.to_string(),
            result.attachment_id.to_string(),
            result.modality,
            result.findings,
            result.impression,
            result.model_version,
            format_timestamp(&result.created_at),
        ],
    )?;
    Ok(affected == 1)
}

pub fn get_scan_result_by_attachment(
    conn: &Connection,
    attachment_id: &Uuid,
) -> Result<Option<ScanResult>, DatabaseError> {
    let result = conn
        .query_row(
            &format!("SELECT {SCAN_COLUMNS} FROM scan_results WHERE attachment_id = ?1"),
            params![attachment_id.to_string()],
            |row| {
                Ok(ScanResult {
                    id: uuid_column(row, 0)?,
                    attachment_id: uuid_column(row, 1)?,
                    modality: row.get(2)?,
                    findings: row.get(3)?,
                    impression: row.get(4)?,
                    model_version: row.get(5)?,
                    created_at: timestamp_column(row, 6)?,
                })
            },
        )
        .optional()?;
    Ok(result)
}

/// Apply clinician corrections. `None` leaves a field unchanged.
pub fn update_scan_result(
    conn: &Connection,
    attachment_id: &Uuid,
    modality: Option<&str>,
    findings: Option<&str>,
    impression: Option<&str>,
) -> Result<ScanResult, DatabaseError> {
    let affected = conn.execute(
        "UPDATE scan_results
         SET modality = COALESCE(?1, modality),
             findings = COALESCE(?2, findings),
             impression = COALESCE(?3, impression)
         WHERE attachment_id = ?4",
        params![modality, findings, impression, attachment_id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ScanResult".into(),
            id: attachment_id.to_string(),
        });
    }
    get_scan_result_by_attachment(conn, attachment_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "ScanResult".into(),
        id: attachment_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::make_attachment;
    use crate::db::sqlite::open_memory_database;
    use chrono::Local;
    use std::path::Path;

    fn result_for(attachment_id: Uuid, modality: &str) -> ScanResult {
        ScanResult {
            id: Uuid::new_v4(),
            attachment_id,
            modality: modality.into(),
            findings: "No acute findings.".into(),
            impression: "Normal study.".into(),
            model_version: Some("gemini-2.5-flash-lite".into()),
            created_at: Local::now().naive_local(),
        }
    }

    #[test]
    fn second_insert_keeps_first_result() {
        let conn = open_memory_database().unwrap();
        let att = make_attachment(&conn, Path::new("/uploads/chest.png"));

        assert!(insert_scan_result_if_absent(&conn, &result_for(att, "X-Ray")).unwrap());
        assert!(!insert_scan_result_if_absent(&conn, &result_for(att, "MRI")).unwrap());

        let stored = get_scan_result_by_attachment(&conn, &att).unwrap().unwrap();
        assert_eq!(stored.modality, "X-Ray");
    }

    #[test]
    fn correction_updates_only_given_fields() {
        let conn = open_memory_database().unwrap();
        let att = make_attachment(&conn, Path::new("/uploads/chest.png"));
        insert_scan_result_if_absent(&conn, &result_for(att, "X-Ray")).unwrap();

        let updated =
            update_scan_result(&conn, &att, None, None, Some("Mild peribronchial thickening."))
                .unwrap();
        assert_eq!(updated.modality, "X-Ray");
        assert_eq!(updated.findings, "No acute findings.");
        assert_eq!(updated.impression, "Mild peribronchial thickening.");
    }

    #[test]
    fn correcting_missing_result_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_scan_result(&conn, &Uuid::new_v4(), Some("CT"), None, None).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
