use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VaccinationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vaccination {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub vaccine_name: String,
    pub due_date: NaiveDate,
    pub status: VaccinationStatus,
    pub visit_id: Option<Uuid>,
    pub given_at: Option<NaiveDate>,
}
