//! Chat orchestration: session → persist → context → model → persist.

use chrono::Local;
use rusqlite::Connection;
use uuid::Uuid;

use super::context::{build_system_prompt, PatientContext};
use super::llm::{LlmClient, LlmMessage, LlmRequest, ModelSettings, CHAT_TEMPERATURE};
use super::locks::IntakeLocks;
use super::prompt::UPLOADED_IMAGE_PLACEHOLDER;
use super::scan::ScanAnalyzer;
use super::session::SessionManager;
use super::summarizer::ConversationSummarizer;
use super::types::{ChatReply, ChatRequest, ConversationTurn, ScanFinding, TurnRole};
use super::IntakeError;
use crate::db::repository;
use crate::models::MessageSender;

/// Entry point for every intake operation. One instance per unit of work,
/// borrowing that unit's connection.
pub struct ChatOrchestrator<'a> {
    conn: &'a Connection,
    llm: &'a dyn LlmClient,
    models: &'a ModelSettings,
    locks: &'a IntakeLocks,
}

impl<'a> ChatOrchestrator<'a> {
    pub fn new(
        conn: &'a Connection,
        llm: &'a dyn LlmClient,
        models: &'a ModelSettings,
        locks: &'a IntakeLocks,
    ) -> Self {
        Self {
            conn,
            llm,
            models,
            locks,
        }
    }

    fn scan_analyzer(&self) -> ScanAnalyzer<'a> {
        ScanAnalyzer::new(
            self.conn,
            self.llm,
            &self.models.vision_model,
            &self.locks.attachments,
        )
    }

    fn summarizer(&self) -> ConversationSummarizer<'a> {
        ConversationSummarizer::new(
            self.conn,
            self.llm,
            &self.models.summary_model,
            &self.locks.sessions,
        )
    }

    /// Run one chat exchange.
    ///
    /// The parent's turn is stored before the model is called, so a model
    /// failure leaves it in place with no reply turn.
    pub fn chat(&self, request: &ChatRequest) -> Result<ChatReply, IntakeError> {
        let _span = tracing::info_span!(
            "intake_chat",
            patient_id = %request.patient_id,
            mode = request.mode.as_str(),
            history = request.history.len()
        )
        .entered();

        let patient = repository::get_patient(self.conn, &request.patient_id)?
            .ok_or(IntakeError::PatientNotFound(request.patient_id))?;

        if let Some(attachment_id) = request.attachment_id {
            if repository::get_attachment(self.conn, &attachment_id)?.is_none() {
                return Err(IntakeError::AttachmentNotFound(attachment_id));
            }
        }

        let message = effective_message(&request.message, request.attachment_id.is_some())
            .ok_or_else(|| IntakeError::InvalidInput("message is empty".into()))?;

        let sessions = SessionManager::new(self.conn);
        let session = sessions.resolve_session(request.patient_id, request.session_id, message)?;
        sessions.append_turn(
            session.id,
            MessageSender::User,
            message,
            request.attachment_id,
        )?;

        let finding: Option<ScanFinding> = request
            .attachment_id
            .and_then(|id| self.scan_analyzer().analyze(id));

        let today = Local::now().date_naive();
        let context = PatientContext::load(self.conn, &patient, &request.patient_stats, today)?;
        let system = build_system_prompt(&context, request.mode, &request.history, finding.as_ref());

        let llm_request = build_chat_request(&self.models.chat_model, system, &request.history, message);
        let reply = self.llm.generate(&llm_request)?.into_text();

        sessions.append_turn(session.id, MessageSender::Ai, &reply, None)?;
        tracing::info!(session_id = %session.id, reply_chars = reply.len(), "Chat turn completed");

        Ok(ChatReply {
            text: reply,
            session_id: session.id,
            structured_findings: finding,
        })
    }

    /// Visit-summary JSON for the conversation so far.
    pub fn summarize(
        &self,
        history: &[ConversationTurn],
        patient_id: Uuid,
        session_id: Option<Uuid>,
    ) -> Result<String, IntakeError> {
        self.summarizer().summarize(history, patient_id, session_id)
    }

    /// Narrative of the patient's most recent visits.
    pub fn history_summary(&self, patient_id: Uuid) -> Result<String, IntakeError> {
        self.summarizer().summarize_history(patient_id)
    }

    /// Stored or freshly computed finding for an attachment.
    pub fn analyze_scan(&self, attachment_id: Uuid) -> Result<ScanFinding, IntakeError> {
        self.scan_analyzer().try_analyze(attachment_id)
    }
}

/// The text stored and sent for the parent's turn. An upload without text
/// gets a placeholder; no text and no upload is rejected.
fn effective_message(message: &str, has_attachment: bool) -> Option<&str> {
    if !message.trim().is_empty() {
        Some(message)
    } else if has_attachment {
        Some(UPLOADED_IMAGE_PLACEHOLDER)
    } else {
        None
    }
}

/// System prompt, prior turns in order, then the new message.
pub fn build_chat_request(
    model: &str,
    system: String,
    history: &[ConversationTurn],
    message: &str,
) -> LlmRequest {
    let mut request = LlmRequest::new(model, CHAT_TEMPERATURE).with_system(system);
    for turn in history {
        request = request.with_message(match turn.role {
            TurnRole::Parent => LlmMessage::user(&turn.text),
            TurnRole::Assistant => LlmMessage::model(&turn.text),
        });
    }
    request.with_message(LlmMessage::user(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{make_attachment, make_patient, make_vaccination};
    use crate::db::sqlite::open_memory_database;
    use crate::intake::llm::{LlmRole, MockFailure, MockLlmClient};
    use crate::intake::types::{ChatMode, PatientStats};
    use crate::models::VaccinationStatus;
    use chrono::{Duration, NaiveDate};
    use std::io::Write;

    fn request(patient_id: Uuid, message: &str) -> ChatRequest {
        ChatRequest {
            patient_id,
            mode: ChatMode::Patient,
            history: vec![],
            message: message.to_string(),
            session_id: None,
            attachment_id: None,
            patient_stats: PatientStats::default(),
        }
    }

    #[test]
    fn new_patient_fever_scenario() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2022, 3, 10).unwrap());
        let mock = MockLlmClient::new("I'm sorry to hear that. How long has he had the fever?");
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();
        let orchestrator = ChatOrchestrator::new(&conn, &mock, &models, &locks);

        let reply = orchestrator
            .chat(&request(patient_id, "my son has a fever of 101"))
            .unwrap();

        assert_eq!(reply.text, "I'm sorry to hear that. How long has he had the fever?");
        assert!(reply.structured_findings.is_none());
        assert_eq!(mock.call_count(), 1);

        let session = repository::get_chat_session(&conn, &reply.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(session.name, "my son has a fever of 101");

        let stored = repository::get_chat_messages(&conn, &reply.session_id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].sender, MessageSender::User);
        assert_eq!(stored[0].text, "my son has a fever of 101");
        assert_eq!(stored[1].sender, MessageSender::Ai);
        assert_eq!(stored[1].text, reply.text);

        let sent = mock.last_request().unwrap();
        assert_eq!(sent.model, models.chat_model);
        let system = sent.system.unwrap();
        assert!(system.contains("MISSING from the record: Weight, Height."));
        assert!(!system.contains("Vaccination Check"));
        assert!(system.contains("You have asked 0/10 allowed questions"));
        assert_eq!(sent.messages.len(), 1);
        assert_eq!(sent.messages[0].text(), "my son has a fever of 101");
    }

    #[test]
    fn history_is_mapped_to_roles_in_order() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mock = MockLlmClient::new("Any vomiting?");
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();

        let mut req = request(patient_id, "About 39 degrees");
        req.history = vec![
            ConversationTurn::parent("She has a fever"),
            ConversationTurn::assistant("How high is it?"),
        ];
        ChatOrchestrator::new(&conn, &mock, &models, &locks)
            .chat(&req)
            .unwrap();

        let sent = mock.last_request().unwrap();
        let roles: Vec<LlmRole> = sent.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![LlmRole::User, LlmRole::Model, LlmRole::User]);
        assert_eq!(sent.messages[2].text(), "About 39 degrees");
        assert!(sent.system.unwrap().contains("You have asked 1/10"));
    }

    #[test]
    fn model_failure_keeps_parent_turn_only() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mock = MockLlmClient::failing(MockFailure::Timeout);
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();
        let orchestrator = ChatOrchestrator::new(&conn, &mock, &models, &locks);

        let err = orchestrator.chat(&request(patient_id, "Rash on arms")).unwrap_err();
        assert!(matches!(err, IntakeError::Timeout(_)));

        let session = repository::get_latest_chat_session(&conn, &patient_id)
            .unwrap()
            .unwrap();
        let stored = repository::get_chat_messages(&conn, &session.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "Rash on arms");
    }

    #[test]
    fn upload_without_text_uses_placeholder_and_scan_context() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mut image = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        image.write_all(b"png").unwrap();
        let attachment_id = make_attachment(&conn, image.path());

        let mock = MockLlmClient::new("The X-ray looks clear.").with_replies(&[
            r#"{"modality": "X-Ray", "findings": "Clear lung fields.", "impression": "Normal."}"#,
        ]);
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();

        let mut req = request(patient_id, "   ");
        req.attachment_id = Some(attachment_id);
        let reply = ChatOrchestrator::new(&conn, &mock, &models, &locks)
            .chat(&req)
            .unwrap();

        assert_eq!(reply.structured_findings.unwrap().modality, "X-Ray");
        assert_eq!(mock.call_count(), 2);

        let chat_call = mock.last_request().unwrap();
        assert!(chat_call.system.unwrap().contains("**Findings**: Clear lung fields."));
        assert_eq!(chat_call.messages[0].text(), "[Uploaded Image]");

        let stored = repository::get_chat_messages(&conn, &reply.session_id).unwrap();
        assert_eq!(stored[0].attachment_id, Some(attachment_id));
        assert_eq!(stored[0].text, "[Uploaded Image]");
    }

    #[test]
    fn empty_message_without_upload_is_rejected() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mock = MockLlmClient::new("unused");
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();

        let err = ChatOrchestrator::new(&conn, &mock, &models, &locks)
            .chat(&request(patient_id, ""))
            .unwrap_err();
        assert!(matches!(err, IntakeError::InvalidInput(_)));
        assert_eq!(mock.call_count(), 0);
        assert!(repository::get_latest_chat_session(&conn, &patient_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_patient_and_attachment_are_not_found() {
        let conn = open_memory_database().unwrap();
        let mock = MockLlmClient::new("unused");
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();
        let orchestrator = ChatOrchestrator::new(&conn, &mock, &models, &locks);

        assert!(matches!(
            orchestrator.chat(&request(Uuid::new_v4(), "hi")),
            Err(IntakeError::PatientNotFound(_))
        ));

        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mut req = request(patient_id, "see scan");
        req.attachment_id = Some(Uuid::new_v4());
        assert!(matches!(
            orchestrator.chat(&req),
            Err(IntakeError::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn overdue_vaccine_reaches_system_prompt() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        let today = Local::now().date_naive();
        make_vaccination(&conn, patient_id, "MMR-1", today - Duration::days(1), VaccinationStatus::Pending);
        make_vaccination(&conn, patient_id, "Hep-A2", today + Duration::days(1), VaccinationStatus::Pending);
        let mock = MockLlmClient::new("Has she received MMR-1 elsewhere?");
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();

        ChatOrchestrator::new(&conn, &mock, &models, &locks)
            .chat(&request(patient_id, "Routine question"))
            .unwrap();

        let system = mock.last_request().unwrap().system.unwrap();
        assert!(system.contains("due/overdue for the following vaccines: MMR-1."));
        assert!(!system.contains("Hep-A2"));
    }

    #[test]
    fn summarize_and_history_delegate() {
        let conn = open_memory_database().unwrap();
        let patient_id = make_patient(&conn, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        let mock = MockLlmClient::new(r#"{"diagnosis": "Fever", "notes": "Two days."}"#);
        let models = ModelSettings::default();
        let locks = IntakeLocks::default();
        let orchestrator = ChatOrchestrator::new(&conn, &mock, &models, &locks);

        let summary = orchestrator
            .summarize(&[ConversationTurn::parent("fever")], patient_id, None)
            .unwrap();
        assert!(summary.contains("\"diagnosis\""));
        assert_eq!(
            orchestrator.history_summary(patient_id).unwrap(),
            "No previous visits recorded."
        );
        assert_eq!(mock.call_count(), 1);
    }
}
