//! Visit-summary generation with an incremental cache per chat session.
//!
//! A session's cached summary covers its first `cached_message_count`
//! turns. When the conversation has grown, only the new turns are sent
//! along with the previous summary.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use super::extract::strip_code_fences;
use super::llm::{LlmClient, LlmMessage, LlmRequest, HISTORY_TEMPERATURE, SUMMARY_TEMPERATURE};
use super::locks::KeyedLocks;
use super::prompt;
use super::types::{ConversationTurn, TurnRole, VisitSummary};
use super::IntakeError;
use crate::db::{repository, DATE_FORMAT};
use crate::models::{ChatSession, Visit};

/// Visits included in a history summary.
pub const HISTORY_VISIT_LIMIT: usize = 5;

/// What a summarize call has to do for the current history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryPlan {
    /// Cached summary covers exactly the current turns.
    Cached(String),
    /// Merge `history[from..]` into `previous`.
    Incremental { previous: String, from: usize },
    /// Summarize the whole transcript.
    Full,
}

pub fn plan_summary(session: Option<&ChatSession>, turn_count: usize) -> SummaryPlan {
    let Some(session) = session else {
        return SummaryPlan::Full;
    };
    match session.summary.as_deref() {
        Some(summary) if session.cached_message_count == turn_count => {
            SummaryPlan::Cached(summary.to_string())
        }
        Some(summary) if session.cached_message_count < turn_count => SummaryPlan::Incremental {
            previous: summary.to_string(),
            from: session.cached_message_count,
        },
        _ => SummaryPlan::Full,
    }
}

/// "Parent: ..." / "Assistant: ..." lines, one per turn.
pub fn format_transcript(turns: &[ConversationTurn]) -> String {
    let mut text = String::new();
    for turn in turns {
        let role = match turn.role {
            TurnRole::Parent => "Parent",
            TurnRole::Assistant => "Assistant",
        };
        text.push_str(&format!("{role}: {}\n", turn.text));
    }
    text
}

pub fn clean_summary_output(raw: &str) -> String {
    strip_code_fences(raw)
}

pub fn validate_visit_summary(text: &str) -> Result<VisitSummary, serde_json::Error> {
    serde_json::from_str(text)
}

/// Most recent recorded vitals as prompt text, or "None".
pub fn latest_vitals_summary(conn: &Connection, patient_id: &Uuid) -> Result<String, IntakeError> {
    let Some(visit) = repository::get_latest_visit(conn, patient_id)? else {
        return Ok("None".to_string());
    };
    let measure = |v: Option<f64>| v.map_or_else(|| "None".to_string(), |x| format!("{x}"));
    let mut vitals = format!(
        "Weight: {} kg, Height: {} cm",
        measure(visit.weight),
        measure(visit.height)
    );
    if let Some(hc) = visit.head_circumference.filter(|hc| *hc > 0.0) {
        vitals.push_str(&format!(", Head Circumference: {hc} cm"));
    }
    Ok(vitals)
}

fn format_visits(visits: &[Visit]) -> String {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
    let mut text = String::new();
    for visit in visits {
        text.push_str(&format!(
            "Date: {}, Type: {}\nDiagnosis: {}\nNotes: {}\n---\n",
            visit.date.format(DATE_FORMAT),
            show(&visit.visit_type),
            show(&visit.diagnosis),
            show(&visit.notes),
        ));
    }
    text
}

pub struct ConversationSummarizer<'a> {
    conn: &'a Connection,
    llm: &'a dyn LlmClient,
    model: &'a str,
    locks: &'a KeyedLocks,
}

impl<'a> ConversationSummarizer<'a> {
    pub fn new(
        conn: &'a Connection,
        llm: &'a dyn LlmClient,
        model: &'a str,
        locks: &'a KeyedLocks,
    ) -> Self {
        Self {
            conn,
            llm,
            model,
            locks,
        }
    }

    /// Summarize `history` into visit-summary JSON text.
    ///
    /// With a session the cached summary is reused or extended and written
    /// back; without one the full transcript is summarized and nothing is cached.
    pub fn summarize(
        &self,
        history: &[ConversationTurn],
        patient_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<String, IntakeError> {
        if repository::get_patient(self.conn, &patient_id)?.is_none() {
            return Err(IntakeError::PatientNotFound(patient_id));
        }
        let today = Local::now().date_naive();

        match session_id {
            Some(id) => self
                .locks
                .with_lock(id, || self.summarize_session(history, patient_id, id, today)),
            None => {
                let (summary, _) = self.generate(&SummaryPlan::Full, history, patient_id, today)?;
                Ok(summary)
            }
        }
    }

    fn summarize_session(
        &self,
        history: &[ConversationTurn],
        patient_id: Uuid,
        session_id: Uuid,
        today: NaiveDate,
    ) -> Result<String, IntakeError> {
        let session = repository::get_chat_session(self.conn, &session_id)?
            .filter(|s| s.patient_id == patient_id)
            .ok_or(IntakeError::SessionNotFound(session_id))?;

        let plan = plan_summary(Some(&session), history.len());
        if let SummaryPlan::Cached(summary) = plan {
            tracing::debug!(session_id = %session_id, "Summary cache hit");
            return Ok(summary);
        }

        let (summary, valid) = self.generate(&plan, history, patient_id, today)?;
        if !valid {
            tracing::warn!(session_id = %session_id, "Summary failed validation, not cached");
            return Ok(summary);
        }

        let stored = repository::update_session_summary(
            self.conn,
            &session_id,
            &summary,
            session.cached_message_count,
            history.len(),
        )?;
        if !stored {
            tracing::warn!(session_id = %session_id, "Summary watermark moved, write-back skipped");
        }
        Ok(summary)
    }

    /// Run the model for `plan`. Returns the cleaned text and whether it
    /// validated. A failed incremental merge is retried once as a full summary.
    fn generate(
        &self,
        plan: &SummaryPlan,
        history: &[ConversationTurn],
        patient_id: Uuid,
        today: NaiveDate,
    ) -> Result<(String, bool), IntakeError> {
        let vitals = latest_vitals_summary(self.conn, &patient_id)?;
        let today = today.format(DATE_FORMAT).to_string();

        if let SummaryPlan::Incremental { previous, from } = plan {
            let delta = history.get(*from..).unwrap_or_default();
            let text = self.call(&prompt::incremental_summary_prompt(
                previous,
                &format_transcript(delta),
                &vitals,
                &today,
            ))?;
            match validate_visit_summary(&text) {
                Ok(_) => return Ok((text, true)),
                Err(e) => tracing::warn!(error = %e, "Incremental summary invalid, regenerating"),
            }
        }

        let text = self.call(&prompt::full_summary_prompt(
            &format_transcript(history),
            &vitals,
            &today,
        ))?;
        let valid = validate_visit_summary(&text).is_ok();
        Ok((text, valid))
    }

    fn call(&self, prompt_text: &str) -> Result<String, IntakeError> {
        let _span = tracing::info_span!("visit_summary", model = %self.model).entered();
        let request = LlmRequest::new(self.model, SUMMARY_TEMPERATURE)
            .with_message(LlmMessage::user(prompt_text));
        let reply = self.llm.generate(&request)?.into_text();
        Ok(clean_summary_output(&reply))
    }

    /// Short narrative of the patient's last visits for the doctor.
    ///
    /// Upstream model failures degrade to a placeholder sentence.
    pub fn summarize_history(&self, patient_id: Uuid) -> Result<String, IntakeError> {
        if repository::get_patient(self.conn, &patient_id)?.is_none() {
            return Err(IntakeError::PatientNotFound(patient_id));
        }
        let visits = repository::get_recent_visits(self.conn, &patient_id, HISTORY_VISIT_LIMIT)?;
        if visits.is_empty() {
            return Ok(prompt::NO_PREVIOUS_VISITS.to_string());
        }

        let _span = tracing::info_span!(
            "history_summary",
            patient_id = %patient_id,
            visits = visits.len()
        )
        .entered();
        let request = LlmRequest::new(self.model, HISTORY_TEMPERATURE).with_message(
            LlmMessage::user(&prompt::history_summary_prompt(&format_visits(&visits))),
        );
        match self.llm.generate(&request) {
            Ok(reply) => Ok(reply.into_text().trim().to_string()),
            Err(e) if e.is_upstream() => {
                tracing::warn!(error = %e, "History summary unavailable");
                Ok(prompt::HISTORY_SUMMARY_UNAVAILABLE.to_string())
            }
            Err(e) => Err(e),
        }
    }
}
