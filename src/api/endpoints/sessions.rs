//! Chat session endpoints.
//!
//! These read and write stored sessions only; none of them needs a model
//! client.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::endpoints::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CreateSessionBody, DeletedResponse, PatientBody, SessionBody};
use crate::chat::{MessageView, SessionSummary};
use crate::intake::SessionManager;

/// `POST /api/ai/sessions/list`: a patient's sessions, most recent first.
pub async fn list(
    State(ctx): State<ApiContext>,
    body: Result<Json<PatientBody>, JsonRejection>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let Json(req) = body?;
    let sessions = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        Ok(SessionManager::new(&conn).summaries(req.patient_id)?)
    })
    .await?;
    Ok(Json(sessions))
}

/// `POST /api/ai/sessions/create`
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Result<Json<CreateSessionBody>, JsonRejection>,
) -> Result<Json<SessionSummary>, ApiError> {
    let Json(req) = body?;
    let session = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        let session = SessionManager::new(&conn).start(req.patient_id, req.name.as_deref())?;
        tracing::info!(session_id = %session.id, patient_id = %session.patient_id, "Chat session created");
        Ok(SessionSummary::from(session))
    })
    .await?;
    Ok(Json(session))
}

/// `POST /api/ai/sessions/messages`: stored turns in chronological order.
pub async fn messages(
    State(ctx): State<ApiContext>,
    body: Result<Json<SessionBody>, JsonRejection>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let Json(req) = body?;
    let messages: Vec<MessageView> = run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        let history = SessionManager::new(&conn).history(req.session_id)?;
        Ok(history.into_iter().map(MessageView::from).collect())
    })
    .await?;
    Ok(Json(messages))
}

/// `POST /api/ai/sessions/delete`: removes the session and its turns.
pub async fn delete(
    State(ctx): State<ApiContext>,
    body: Result<Json<SessionBody>, JsonRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let Json(req) = body?;
    let session_id = req.session_id;
    run_blocking(&ctx, move |core| {
        let conn = core.open_db()?;
        SessionManager::new(&conn).delete(session_id)?;
        tracing::info!(session_id = %session_id, "Chat session deleted");
        Ok(())
    })
    .await?;
    Ok(Json(DeletedResponse {
        deleted: true,
        session_id,
    }))
}
