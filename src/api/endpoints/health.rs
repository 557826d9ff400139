//! Health check endpoint.

use axum::extract::State;
use chrono::{DateTime, Utc};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub submissions: usize,
    pub registry: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

/// `GET /api/health`: liveness, uptime, the configured registry and the
/// number of stored submissions.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let core = &ctx.core;
    Ok(Json(HealthResponse {
        status: "ok",
        name: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
        submissions: core.pipeline.store.len().await,
        registry: core.config.registry.base_url.clone(),
        started_at: core.started_at,
        uptime_secs: (Utc::now() - core.started_at).num_seconds().max(0),
    }))
}
