//! Submission run endpoints.
//!
//! - `POST /api/submit`: validate, group and start dispatch
//! - `GET /api/submit/:id/progress`: aggregate progress
//! - `POST /api/submit/:id/pause` / `resume`: run control

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::parse_submission_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::SubmissionStatus;
use crate::pipeline::submission::{StartReceipt, StartRequest, SubmissionId, SubmissionProgress};

/// `POST /api/submit`: returns as soon as the submission is stored; batches
/// go out in the background. A repeated payload returns the original run.
pub async fn start(
    State(ctx): State<ApiContext>,
    request: Result<Json<StartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StartReceipt>), ApiError> {
    let Json(request) = request?;
    let receipt = ctx.core.pipeline.dispatcher.start(request).await?;
    let status = if receipt.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(receipt)))
}

/// `GET /api/submit/:id/progress`: counters, per-batch state and the
/// rows waiting on confirmation.
pub async fn progress(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionProgress>, ApiError> {
    let id = parse_submission_id(&id)?;
    Ok(Json(ctx.core.pipeline.progress.get_progress(id).await?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStateResponse {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
}

/// `POST /api/submit/:id/pause`: stop before the next batch.
pub async fn pause(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<RunStateResponse>, ApiError> {
    let submission_id = parse_submission_id(&id)?;
    let status = ctx.core.pipeline.dispatcher.pause(submission_id).await?;
    Ok(Json(RunStateResponse { submission_id, status }))
}

/// `POST /api/submit/:id/resume`
pub async fn resume(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<RunStateResponse>, ApiError> {
    let submission_id = parse_submission_id(&id)?;
    let status = ctx.core.pipeline.dispatcher.resume(submission_id).await?;
    Ok(Json(RunStateResponse { submission_id, status }))
}
