//! Intake endpoints.
//!
//! - `POST /api/ai/chat`: one chat exchange
//! - `POST /api/ai/summarize`: visit-summary JSON for the conversation
//! - `POST /api/ai/history-summary`: narrative of recent visits

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::endpoints::with_orchestrator;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PatientBody, SummarizeBody, SummaryResponse};
use crate::intake::{ChatReply, ChatRequest};

/// `POST /api/ai/chat`
pub async fn chat(
    State(ctx): State<ApiContext>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = body?;
    let reply = with_orchestrator(&ctx, move |orchestrator| orchestrator.chat(&request)).await?;
    Ok(Json(reply))
}

/// `POST /api/ai/summarize`
pub async fn summarize(
    State(ctx): State<ApiContext>,
    body: Result<Json<SummarizeBody>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let Json(req) = body?;
    let summary = with_orchestrator(&ctx, move |orchestrator| {
        orchestrator.summarize(&req.history, req.patient_id, req.session_id)
    })
    .await?;
    Ok(Json(SummaryResponse { summary }))
}

/// `POST /api/ai/history-summary`
pub async fn history_summary(
    State(ctx): State<ApiContext>,
    body: Result<Json<PatientBody>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let Json(req) = body?;
    let summary = with_orchestrator(&ctx, move |orchestrator| {
        orchestrator.history_summary(req.patient_id)
    })
    .await?;
    Ok(Json(SummaryResponse { summary }))
}
