//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Layers: CORS (any origin, the clinic UI is served separately) and
//! request tracing.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let ai = Router::new()
        .route("/chat", post(endpoints::ai::chat))
        .route("/summarize", post(endpoints::ai::summarize))
        .route("/history-summary", post(endpoints::ai::history_summary))
        .route("/scan-analysis", post(endpoints::scans::analyze))
        .route("/scan-results/update", post(endpoints::scans::update))
        .route("/sessions/list", post(endpoints::sessions::list))
        .route("/sessions/create", post(endpoints::sessions::create))
        .route("/sessions/messages", post(endpoints::sessions::messages))
        .route("/sessions/delete", post(endpoints::sessions::delete));

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .nest("/ai", ai)
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
