//! System prompt assembly for the intake chat.

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;

use super::prompt;
use super::types::{ChatMode, ConversationTurn, PatientStats, ScanFinding, TurnRole};
use super::IntakeError;
use crate::db::repository;
use crate::models::Patient;

/// Assistant questions allowed in patient mode before the assistant must wrap up.
pub const QUESTION_QUOTA: usize = 10;

/// Patient facts injected into the system prompt. Derived per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientContext {
    pub age: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub pending_vaccine_names: Vec<String>,
}

impl PatientContext {
    /// Build from stored records, filling gaps from client-supplied stats.
    ///
    /// Age comes from the date of birth, weight and height from the most
    /// recent visit, pending vaccines are those due on or before `today`.
    pub fn load(
        conn: &Connection,
        patient: &Patient,
        stats: &PatientStats,
        today: NaiveDate,
    ) -> Result<Self, IntakeError> {
        let latest = repository::get_latest_visit(conn, &patient.id)?;
        let pending = repository::get_pending_vaccinations_due(conn, &patient.id, today)?;

        let recorded = |value: Option<f64>| value.filter(|v| *v > 0.0).map(format_measure);

        Ok(Self {
            age: format_age(patient.dob, today).or_else(|| stats.age()),
            weight: latest
                .as_ref()
                .and_then(|v| recorded(v.weight))
                .or_else(|| stats.weight()),
            height: latest
                .as_ref()
                .and_then(|v| recorded(v.height))
                .or_else(|| stats.height()),
            pending_vaccine_names: pending.into_iter().map(|v| v.vaccine_name).collect(),
        })
    }
}

/// "N months" under two years, "N years" from then on. `None` if `dob` is in the future.
pub fn format_age(dob: NaiveDate, today: NaiveDate) -> Option<String> {
    if dob > today {
        return None;
    }
    let mut months = (today.year() - dob.year()) * 12 + today.month() as i32 - dob.month() as i32;
    if today.day() < dob.day() {
        months -= 1;
    }
    let months = months.max(0);
    Some(match months {
        1 => "1 month".to_string(),
        m if m < 24 => format!("{m} months"),
        m => format!("{} years", m / 12),
    })
}

fn format_measure(value: f64) -> String {
    format!("{value}")
}

/// Vitals the assistant must ask for, in fixed order.
pub fn missing_fields(ctx: &PatientContext) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if ctx.age.is_none() {
        missing.push("Age");
    }
    if ctx.weight.is_none() {
        missing.push("Weight");
    }
    if ctx.height.is_none() {
        missing.push("Height");
    }
    missing
}

pub fn count_assistant_turns(history: &[ConversationTurn]) -> usize {
    history
        .iter()
        .filter(|t| t.role == TurnRole::Assistant)
        .count()
}

/// Assemble the system prompt for one chat call. Blocks with no data are omitted.
pub fn build_system_prompt(
    ctx: &PatientContext,
    mode: ChatMode,
    history: &[ConversationTurn],
    scan: Option<&ScanFinding>,
) -> String {
    let missing = missing_fields(ctx);
    let missing_block = if missing.is_empty() {
        String::new()
    } else {
        prompt::missing_fields_block(&missing)
    };
    let age_block = ctx.age.as_deref().map(prompt::age_block).unwrap_or_default();

    let mut system = match mode {
        ChatMode::Doctor => prompt::doctor_mode_prompt(&age_block, &missing_block),
        ChatMode::Patient => {
            let vaccine_block = if ctx.pending_vaccine_names.is_empty() {
                String::new()
            } else {
                prompt::vaccine_block(&ctx.pending_vaccine_names)
            };
            let asked = count_assistant_turns(history);
            let limit_block = if asked >= QUESTION_QUOTA {
                prompt::limit_reached_block()
            } else {
                prompt::question_quota_block(asked, QUESTION_QUOTA)
            };
            prompt::patient_mode_prompt(&age_block, &missing_block, &vaccine_block, &limit_block)
        }
    };

    if let Some(finding) = scan {
        system.push_str(&prompt::scan_context_block(
            &finding.modality,
            &finding.findings,
            &finding.impression,
        ));
    }
    system
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_patient, make_vaccination, make_visit};
    use crate::db::sqlite::open_memory_database;
    use crate::models::VaccinationStatus;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full_context() -> PatientContext {
        PatientContext {
            age: Some("3 years".into()),
            weight: Some("14".into()),
            height: Some("95".into()),
            pending_vaccine_names: vec![],
        }
    }

    fn alternating_history(assistant_turns: usize) -> Vec<ConversationTurn> {
        let mut history = Vec::new();
        for i in 0..assistant_turns {
            history.push(ConversationTurn::parent(&format!("answer {i}")));
            history.push(ConversationTurn::assistant(&format!("question {i}")));
        }
        history
    }

    #[test]
    fn nine_questions_reports_quota() {
        let prompt = build_system_prompt(
            &full_context(),
            ChatMode::Patient,
            &alternating_history(9),
            None,
        );
        assert!(prompt.contains("You have asked 9/10 allowed questions"));
        assert!(!prompt.contains("LIMIT REACHED"));
    }

    #[test]
    fn ten_questions_reaches_limit() {
        let prompt = build_system_prompt(
            &full_context(),
            ChatMode::Patient,
            &alternating_history(10),
            None,
        );
        assert!(prompt.contains("**LIMIT REACHED**"));
        assert!(!prompt.contains("allowed questions. If you reach"));
    }

    #[test]
    fn missing_age_only_names_age() {
        let ctx = PatientContext {
            age: None,
            ..full_context()
        };
        assert_eq!(missing_fields(&ctx), vec!["Age"]);
        let prompt = build_system_prompt(&ctx, ChatMode::Patient, &[], None);
        assert!(prompt.contains("MISSING from the record: Age. You MUST ask"));
        assert!(!prompt.contains("**Patient Age**"));
    }

    #[test]
    fn doctor_mode_has_no_quota_or_vaccine_block() {
        let ctx = PatientContext {
            pending_vaccine_names: vec!["MMR-1".into()],
            ..full_context()
        };
        let prompt = build_system_prompt(&ctx, ChatMode::Doctor, &alternating_history(12), None);
        assert!(prompt.starts_with("You are an efficient AI Medical Scribe"));
        assert!(prompt.contains("**Patient Age**: 3 years."));
        assert!(!prompt.contains("Vaccination Check"));
        assert!(!prompt.contains("LIMIT REACHED"));
    }

    #[test]
    fn scan_finding_appends_analysis_block() {
        let finding = ScanFinding {
            modality: "X-Ray".into(),
            findings: "Right lower lobe opacity".into(),
            impression: "Suggestive of pneumonia".into(),
        };
        let prompt = build_system_prompt(&full_context(), ChatMode::Patient, &[], Some(&finding));
        assert!(prompt.contains("**ATTACHED SCAN ANALYSIS**"));
        assert!(prompt.contains("**Modality**: X-Ray"));
        assert!(prompt.ends_with("advise seeing a specialist.\n"));
    }

    #[test]
    fn age_formatting_switches_at_two_years() {
        let today = date(2025, 10, 15);
        assert_eq!(format_age(date(2025, 9, 15), today).as_deref(), Some("1 month"));
        assert_eq!(format_age(date(2024, 10, 16), today).as_deref(), Some("11 months"));
        assert_eq!(format_age(date(2023, 11, 1), today).as_deref(), Some("23 months"));
        assert_eq!(format_age(date(2023, 10, 15), today).as_deref(), Some("2 years"));
        assert_eq!(format_age(date(2026, 1, 1), today), None);
    }

    #[test]
    fn context_prefers_records_and_fills_from_stats() {
        let conn = open_memory_database().unwrap();
        let today = date(2025, 10, 15);
        let patient_id = make_patient(&conn, date(2024, 4, 15));
        make_visit(&conn, patient_id, date(2025, 9, 1), Some(9.5), None);
        let patient = repository::get_patient(&conn, &patient_id).unwrap().unwrap();

        let stats: PatientStats =
            serde_json::from_value(serde_json::json!({"weight": 11, "height": "76"})).unwrap();
        let ctx = PatientContext::load(&conn, &patient, &stats, today).unwrap();

        assert_eq!(ctx.age.as_deref(), Some("18 months"));
        assert_eq!(ctx.weight.as_deref(), Some("9.5"));
        assert_eq!(ctx.height.as_deref(), Some("76"));
    }

    #[test]
    fn vaccine_directive_lists_only_due_pending() {
        let conn = open_memory_database().unwrap();
        let today = date(2025, 10, 15);
        let patient_id = make_patient(&conn, date(2024, 10, 1));
        make_vaccination(&conn, patient_id, "MMR-1", today - Duration::days(1), VaccinationStatus::Pending);
        make_vaccination(&conn, patient_id, "Varicella", today + Duration::days(1), VaccinationStatus::Pending);
        let patient = repository::get_patient(&conn, &patient_id).unwrap().unwrap();

        let ctx = PatientContext::load(&conn, &patient, &PatientStats::default(), today).unwrap();
        let prompt = build_system_prompt(&ctx, ChatMode::Patient, &[], None);

        assert!(prompt.contains("**Vaccination Check**"));
        assert!(prompt.contains("following vaccines: MMR-1."));
        assert!(!prompt.contains("Varicella"));
    }
}
