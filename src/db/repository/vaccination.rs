use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{
    date_column, enum_column, format_date, optional_date_column, optional_uuid_column, row_error,
    uuid_column,
};
use crate::db::DatabaseError;
use crate::models::Vaccination;

const VACCINATION_COLUMNS: &str =
    "id, patient_id, vaccine_name, due_date, status, visit_id, given_at";

pub fn insert_vaccination(conn: &Connection, vax: &Vaccination) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO vaccinations ({VACCINATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            vax.id.to_string(),
            vax.patient_id.to_string(),
            vax.vaccine_name,
            format_date(&vax.due_date),
            vax.status.as_str(),
            vax.visit_id.map(|id| id.to_string()),
            vax.given_at.as_ref().map(format_date),
        ],
    )?;
    Ok(())
}

/// Pending vaccinations whose due date is on or before `today`.
pub fn get_pending_vaccinations_due(
    conn: &Connection,
    patient_id: &Uuid,
    today: NaiveDate,
) -> Result<Vec<Vaccination>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VACCINATION_COLUMNS} FROM vaccinations
         WHERE patient_id = ?1 AND status = 'pending' AND due_date <= ?2
         ORDER BY due_date ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), format_date(&today)],
        row_to_vaccination,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(row_error)
}

fn row_to_vaccination(row: &rusqlite::Row) -> Result<Vaccination, rusqlite::Error> {
    Ok(Vaccination {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        vaccine_name: row.get(2)?,
        due_date: date_column(row, 3)?,
        status: enum_column(row, 4)?,
        visit_id: optional_uuid_column(row, 5)?,
        given_at: optional_date_column(row, 6)?,
    })
}
