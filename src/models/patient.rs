use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    /// Parental heights in cm, used for mid-parental height targets.
    pub father_height: Option<f64>,
    pub mother_height: Option<f64>,
    pub created_at: NaiveDateTime,
}
