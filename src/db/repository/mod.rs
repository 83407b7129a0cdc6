//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table. All public functions are re-exported here.
//! UUIDs are stored as text, timestamps with `TIMESTAMP_FORMAT`, calendar
//! dates with `DATE_FORMAT`.

mod attachment;
mod chat_session;
mod patient;
mod scan_result;
mod vaccination;
mod visit;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use uuid::Uuid;

use super::{DatabaseError, DATE_FORMAT, TIMESTAMP_FORMAT};

pub use attachment::*;
pub use chat_session::*;
pub use patient::*;
pub use scan_result::*;
pub use vaccination::*;
pub use visit::*;

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a `str_enum!` text column. A bad value surfaces as
/// `DatabaseError::InvalidEnum` once the row error passes through `row_error`.
pub(crate) fn enum_column<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Convert a row-mapping error, recovering typed `DatabaseError`s raised
/// inside the mapping closure.
pub(crate) fn row_error(err: rusqlite::Error) -> DatabaseError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(idx, ty, inner) => {
            match inner.downcast::<DatabaseError>() {
                Ok(typed) => *typed,
                Err(inner) => {
                    DatabaseError::Sqlite(rusqlite::Error::FromSqlConversionFailure(idx, ty, inner))
                }
            }
        }
        other => DatabaseError::Sqlite(other),
    }
}

pub(crate) fn uuid_column(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_uuid_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Uuid>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn timestamp_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<NaiveDateTime, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn date_column(row: &rusqlite::Row, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn optional_date_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<NaiveDate>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Shared builders for tests that need a populated clinic database.
#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Local, NaiveDate};
    use rusqlite::Connection;
    use uuid::Uuid;

    use super::*;
    use crate::models::*;

    pub fn make_patient(conn: &Connection, dob: NaiveDate) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(
            conn,
            &Patient {
                id,
                name: "Aarav".into(),
                dob,
                gender: Gender::Male,
                father_height: Some(178.0),
                mother_height: Some(162.0),
                created_at: Local::now().naive_local(),
            },
        )
        .unwrap();
        id
    }

    pub fn make_visit(
        conn: &Connection,
        patient_id: Uuid,
        date: NaiveDate,
        weight: Option<f64>,
        height: Option<f64>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        insert_visit(
            conn,
            &Visit {
                id,
                patient_id,
                date,
                age: Some(1.5),
                weight,
                height,
                head_circumference: None,
                temperature: None,
                heart_rate: None,
                blood_pressure: None,
                visit_type: Some("General".into()),
                diagnosis: Some("Well child".into()),
                notes: Some("Routine check".into()),
                prescription: None,
                follow_up_date: None,
            },
        )
        .unwrap();
        id
    }

    pub fn make_vaccination(
        conn: &Connection,
        patient_id: Uuid,
        name: &str,
        due_date: NaiveDate,
        status: VaccinationStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        insert_vaccination(
            conn,
            &Vaccination {
                id,
                patient_id,
                vaccine_name: name.into(),
                due_date,
                status,
                visit_id: None,
                given_at: None,
            },
        )
        .unwrap();
        id
    }

    pub fn make_attachment(conn: &Connection, path: &std::path::Path) -> Uuid {
        let id = Uuid::new_v4();
        insert_attachment(
            conn,
            &Attachment {
                id,
                visit_id: None,
                session_id: None,
                file_path: path.to_path_buf(),
                name: "scan.png".into(),
                uploaded_at: Local::now().naive_local(),
            },
        )
        .unwrap();
        id
    }
}
