//! API endpoint handlers.
//!
//! Intake work is synchronous (SQLite, blocking model client), so every
//! handler hands its unit of work to tokio's blocking pool and opens its
//! own connection there.

pub mod ai;
pub mod health;
pub mod scans;
pub mod sessions;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::intake::{ChatOrchestrator, IntakeError};

/// Run `work` on the blocking pool with access to the shared state.
pub(crate) async fn run_blocking<T, F>(ctx: &ApiContext, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&CoreState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || work(&core)).await?
}

/// Run `work` against an orchestrator bound to a fresh connection.
///
/// Fails with `AI_NOT_CONFIGURED` before touching the database when no
/// model client exists.
pub(crate) async fn with_orchestrator<T, F>(ctx: &ApiContext, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&ChatOrchestrator<'_>) -> Result<T, IntakeError> + Send + 'static,
    T: Send + 'static,
{
    run_blocking(ctx, move |core| {
        let llm = core.llm()?;
        let conn = core.open_db()?;
        let orchestrator = ChatOrchestrator::new(&conn, llm.as_ref(), &core.models, &core.locks);
        Ok(work(&orchestrator)?)
    })
    .await
}
