//! Scan endpoints.
//!
//! - `POST /api/ai/scan-analysis`: stored or freshly computed finding
//! - `POST /api/ai/scan-results/update`: clinician correction

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::endpoints::{run_blocking, with_orchestrator};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AttachmentBody, ScanUpdateBody};
use crate::db::repository;
use crate::intake::ScanFinding;

/// `POST /api/ai/scan-analysis`
pub async fn analyze(
    State(ctx): State<ApiContext>,
    body: Result<Json<AttachmentBody>, JsonRejection>,
) -> Result<Json<ScanFinding>, ApiError> {
    let Json(req) = body?;
    let finding = with_orchestrator(&ctx, move |orchestrator| {
        orchestrator.analyze_scan(req.attachment_id)
    })
    .await?;
    Ok(Json(finding))
}

/// `POST /api/ai/scan-results/update`
///
/// Runs under the attachment's lock so a correction never interleaves with
/// a first analysis of the same scan. Needs no model client.
pub async fn update(
    State(ctx): State<ApiContext>,
    body: Result<Json<ScanUpdateBody>, JsonRejection>,
) -> Result<Json<ScanFinding>, ApiError> {
    let Json(req) = body?;
    if req.modality.is_none() && req.findings.is_none() && req.impression.is_none() {
        return Err(ApiError::BadRequest(
            "At least one of modality, findings or impression is required".into(),
        ));
    }

    let finding = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        let updated = core.locks.attachments.with_lock(req.attachment_id, || {
            repository::update_scan_result(
                &conn,
                &req.attachment_id,
                req.modality.as_deref(),
                req.findings.as_deref(),
                req.impression.as_deref(),
            )
        })?;
        tracing::info!(attachment_id = %req.attachment_id, "Scan result corrected");
        Ok(ScanFinding::from(updated))
    })
    .await?;
    Ok(Json(finding))
}
