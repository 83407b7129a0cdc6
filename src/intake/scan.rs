//! Vision-model analysis of uploaded scans, memoized per attachment.

use chrono::Local;
use rusqlite::Connection;
use uuid::Uuid;

use super::extract::{extract_json_object, value_to_text};
use super::llm::{LlmClient, LlmMessage, LlmPart, LlmRequest, LlmRole, VISION_TEMPERATURE};
use super::locks::KeyedLocks;
use super::prompt::{SCAN_ANALYSIS_PROMPT, SCAN_JSON_FORMAT_PROMPT};
use super::types::ScanFinding;
use super::IntakeError;
use crate::db::repository;
use crate::models::ScanResult;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

pub struct ScanAnalyzer<'a> {
    conn: &'a Connection,
    llm: &'a dyn LlmClient,
    model: &'a str,
    locks: &'a KeyedLocks,
}

impl<'a> ScanAnalyzer<'a> {
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

    /// Best-effort analysis. Any failure is logged and reported as `None`.
    pub fn analyze(&self, attachment_id: Uuid) -> Option<ScanFinding> {
        match self.try_analyze(attachment_id) {
            Ok(finding) => Some(finding),
            Err(e) => {
                tracing::warn!(attachment_id = %attachment_id, error = %e, "Scan analysis unavailable");
                None
            }
        }
    }

    /// Return the stored finding for an attachment, analyzing it first if
    /// needed. At most one model call per attachment within the process.
    pub fn try_analyze(&self, attachment_id: Uuid) -> Result<ScanFinding, IntakeError> {
        self.locks
            .with_lock(attachment_id, || self.analyze_locked(attachment_id))
    }

    fn analyze_locked(&self, attachment_id: Uuid) -> Result<ScanFinding, IntakeError> {
        if let Some(existing) = repository::get_scan_result_by_attachment(self.conn, &attachment_id)? {
            tracing::debug!(attachment_id = %attachment_id, "Scan finding served from cache");
            return Ok(existing.into());
        }

        let attachment = repository::get_attachment(self.conn, &attachment_id)?
            .ok_or(IntakeError::AttachmentNotFound(attachment_id))?;

        let bytes = std::fs::read(&attachment.file_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IntakeError::AttachmentFileMissing(attachment.file_path.display().to_string())
            } else {
                IntakeError::Io(e)
            }
        })?;
        let mime_type = image_mime_type(&attachment.file_path);

        let _span = tracing::info_span!(
            "scan_analysis",
            attachment_id = %attachment_id,
            model = %self.model,
            bytes = bytes.len()
        )
        .entered();

        let request = LlmRequest::new(self.model, VISION_TEMPERATURE)
            .with_message(LlmMessage {
                role: LlmRole::User,
                parts: vec![
                    LlmPart::Text(SCAN_ANALYSIS_PROMPT.to_string()),
                    LlmPart::Image {
                        mime_type,
                        data: bytes,
                    },
                ],
            })
            .with_message(LlmMessage::user(SCAN_JSON_FORMAT_PROMPT));

        let reply = self.llm.generate(&request)?.into_text();
        let finding = parse_scan_finding(&reply);

        let created = repository::insert_scan_result_if_absent(
            self.conn,
            &ScanResult {
                id: Uuid::new_v4(),
                attachment_id,
                modality: finding.modality.clone(),
                findings: finding.findings.clone(),
                impression: finding.impression.clone(),
                model_version: Some(self.model.to_string()),
                created_at: Local::now().naive_local(),
            },
        )?;
        if !created {
            tracing::info!(attachment_id = %attachment_id, "Scan finding already stored by another writer");
        }

        // The stored row is authoritative, whoever wrote it.
        Ok(repository::get_scan_result_by_attachment(self.conn, &attachment_id)?
            .map(ScanFinding::from)
            .unwrap_or(finding))
    }
}

/// Guess the upload's MIME type from its extension, defaulting to JPEG.
pub fn image_mime_type(path: &std::path::Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .filter(|m| m.starts_with("image/"))
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string()
}

/// Interpret vision-model output. Text without a parseable JSON object is
/// kept whole as the findings of an "Unknown" study.
pub fn parse_scan_finding(reply: &str) -> ScanFinding {
    match extract_json_object(reply) {
        Some(map) => {
            let field = |key: &str, default: &str| {
                map.get(key)
                    .filter(|v| !v.is_null())
                    .map(value_to_text)
                    .unwrap_or_else(|| default.to_string())
            };
            ScanFinding {
                modality: field("modality", "Unknown"),
                findings: field("findings", ""),
                impression: field("impression", ""),
            }
        }
        None => ScanFinding {
            modality: "Unknown".to_string(),
            findings: reply.to_string(),
            impression: "See findings.".to_string(),
        },
    }
}
