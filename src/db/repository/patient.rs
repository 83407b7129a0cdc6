use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{date_column, format_date, format_timestamp, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::{Gender, Patient};

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, dob, gender, father_height, mother_height, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient.id.to_string(),
            patient.name,
            format_date(&patient.dob),
            patient.gender.as_str(),
            patient.father_height,
            patient.mother_height,
            format_timestamp(&patient.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let patient = conn
        .query_row(
            "SELECT id, name, dob, gender, father_height, mother_height, created_at
             FROM patients WHERE id = ?1",
            params![id.to_string()],
            row_to_patient,
        )
        .optional()?;
    Ok(patient)
}

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, rusqlite::Error> {
    let gender_str: String = row.get(3)?;
    Ok(Patient {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        dob: date_column(row, 2)?,
        gender: Gender::from_str(&gender_str).unwrap_or(Gender::Male),
        father_height: row.get(4)?,
        mother_height: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::make_patient;
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDate;

    #[test]
    fn insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let dob = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let id = make_patient(&conn, dob);

        let patient = get_patient(&conn, &id).unwrap().unwrap();
        assert_eq!(patient.dob, dob);
        assert_eq!(patient.gender, Gender::Male);
        assert_eq!(patient.father_height, Some(178.0));
    }

    #[test]
    fn missing_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_patient(&conn, &Uuid::new_v4()).unwrap().is_none());
    }
}
