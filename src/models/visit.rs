use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded clinic visit. Units: kg, cm, Fahrenheit, bpm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    /// Age in years at the time of the visit.
    pub age: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub head_circumference: Option<f64>,
    pub temperature: Option<f64>,
    pub heart_rate: Option<i64>,
    pub blood_pressure: Option<String>,
    /// Comma-separated tags, e.g. "Sick, Vaccination".
    pub visit_type: Option<String>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}
