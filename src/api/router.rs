//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layers (outermost → innermost): Extension → CORS → audit logger.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router with every endpoint under `/api/`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/submit", post(endpoints::submit::start))
        .route("/submit/:id/progress", get(endpoints::submit::progress))
        .route("/submit/:id/pause", post(endpoints::submit::pause))
        .route("/submit/:id/resume", post(endpoints::submit::resume))
        .route("/submissions", get(endpoints::submissions::list))
        .route(
            "/submissions/:id",
            axum::routing::delete(endpoints::submissions::purge),
        )
        .route("/submissions/:id/results", get(endpoints::results::list))
        .route("/submissions/:id/export", get(endpoints::export::download))
        .route(
            "/submissions/:id/confirm-all-warnings",
            post(endpoints::records::confirm_all),
        )
        .route(
            "/submissions/:id/records/:row",
            get(endpoints::records::detail),
        )
        .route(
            "/submissions/:id/records/:row/confirm",
            post(endpoints::records::confirm),
        )
        .route(
            "/submissions/:id/records/:row/resubmit",
            post(endpoints::records::resubmit),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", routes)
}
