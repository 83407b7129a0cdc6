use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{date_column, format_date, optional_date_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::Visit;

const VISIT_COLUMNS: &str = "id, patient_id, date, age, weight, height, head_circumference,
     temperature, heart_rate, blood_pressure, visit_type, diagnosis, notes, prescription,
     follow_up_date";

pub fn insert_visit(conn: &Connection, visit: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO visits ({VISIT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            visit.id.to_string(),
            visit.patient_id.to_string(),
            format_date(&visit.date),
            visit.age,
            visit.weight,
            visit.height,
            visit.head_circumference,
            visit.temperature,
            visit.heart_rate,
            visit.blood_pressure,
            visit.visit_type,
            visit.diagnosis,
            visit.notes,
            visit.prescription,
            visit.follow_up_date.as_ref().map(format_date),
        ],
    )?;
    Ok(())
}

/// Most recent visit of a patient by visit date.
pub fn get_latest_visit(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Visit>, DatabaseError> {
    let visit = conn
        .query_row(
            &format!(
                "SELECT {VISIT_COLUMNS} FROM visits
                 WHERE patient_id = ?1
                 ORDER BY date DESC, rowid DESC
                 LIMIT 1"
            ),
            params![patient_id.to_string()],
            row_to_visit,
        )
        .optional()?;
    Ok(visit)
}

/// Up to `limit` visits of a patient, newest first.
pub fn get_recent_visits(
    conn: &Connection,
    patient_id: &Uuid,
    limit: usize,
) -> Result<Vec<Visit>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits
         WHERE patient_id = ?1
         ORDER BY date DESC, rowid DESC
         LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string(), limit as i64], row_to_visit)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_visit(row: &rusqlite::Row) -> Result<Visit, rusqlite::Error> {
    Ok(Visit {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        date: date_column(row, 2)?,
        age: row.get(3)?,
        weight: row.get(4)?,
        height: row.get(5)?,
        head_circumference: row.get(6)?,
        temperature: row.get(7)?,
        heart_rate: row.get(8)?,
        blood_pressure: row.get(9)?,
        visit_type: row.get(10)?,
        diagnosis: row.get(11)?,
        notes: row.get(12)?,
        prescription: row.get(13)?,
        follow_up_date: optional_date_column(row, 14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_patient, make_visit};
    use crate::db::sqlite::open_memory_database;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn latest_visit_is_by_date_not_insertion() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, date(2024, 1, 1));
        make_visit(&conn, patient, date(2025, 6, 1), Some(9.0), Some(74.0));
        make_visit(&conn, patient, date(2025, 1, 1), Some(8.0), Some(70.0));

        let latest = get_latest_visit(&conn, &patient).unwrap().unwrap();
        assert_eq!(latest.date, date(2025, 6, 1));
        assert_eq!(latest.weight, Some(9.0));
    }

    #[test]
    fn no_visits_returns_none() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, date(2024, 1, 1));
        assert!(get_latest_visit(&conn, &patient).unwrap().is_none());
    }

    #[test]
    fn recent_visits_respects_limit_and_order() {
        let conn = open_memory_database().unwrap();
        let patient = make_patient(&conn, date(2024, 1, 1));
        for month in 1..=7 {
            make_visit(&conn, patient, date(2025, month, 10), None, None);
        }

        let recent = get_recent_visits(&conn, &patient, 5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].date, date(2025, 7, 10));
        assert_eq!(recent[4].date, date(2025, 3, 10));
    }

    #[test]
    fn visit_requires_existing_patient() {
        let conn = open_memory_database().unwrap();
        let orphan = Visit {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            date: date(2025, 1, 1),
            age: None,
            weight: None,
            height: None,
            head_circumference: None,
            temperature: None,
            heart_rate: None,
            blood_pressure: None,
            visit_type: None,
            diagnosis: None,
            notes: None,
            prescription: None,
            follow_up_date: None,
        };
        assert!(insert_visit(&conn, &orphan).is_err());
    }
}
