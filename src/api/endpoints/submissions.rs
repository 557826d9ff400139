//! Submission listing and purge.
//!
//! - `GET /api/submissions`: newest first
//! - `DELETE /api/submissions/:id`: only once the run has finished

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::parse_submission_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::submission::SubmissionSummary;

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<SubmissionSummary>>, ApiError> {
    Ok(Json(ctx.core.pipeline.store.list().await))
}

pub async fn purge(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_submission_id(&id)?;
    ctx.core.pipeline.store.purge(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
