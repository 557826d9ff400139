//! Per-row endpoints: detail, confirm-or-correct.
//!
//! - `GET /api/submissions/:id/records/:row`
//! - `POST /api/submissions/:id/records/:row/confirm`
//! - `POST /api/submissions/:id/records/:row/resubmit`
//! - `POST /api/submissions/:id/confirm-all-warnings`

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use super::{parse_row, parse_submission_id};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::submission::progress::ResultView;
use crate::pipeline::submission::{ConfirmAllReport, RecordCorrection, RecordDetail};

/// `GET /api/submissions/:id/records/:row`: current result, superseded
/// results and the current record version.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path((id, row)): Path<(String, String)>,
) -> Result<Json<RecordDetail>, ApiError> {
    let id = parse_submission_id(&id)?;
    let row = parse_row(&row)?;
    Ok(Json(ctx.core.pipeline.progress.record(id, row).await?))
}

/// `POST /api/submissions/:id/records/:row/confirm`: 409 unless the row
/// is awaiting confirmation.
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Path((id, row)): Path<(String, String)>,
) -> Result<Json<ResultView>, ApiError> {
    let id = parse_submission_id(&id)?;
    let row = parse_row(&row)?;
    let result = ctx.core.pipeline.confirmation.confirm_one(id, row).await?;
    Ok(Json(ResultView::new(result)))
}

/// `POST /api/submissions/:id/records/:row/resubmit`: corrected fields in
/// the body; absent fields keep their stored value.
pub async fn resubmit(
    State(ctx): State<ApiContext>,
    Path((id, row)): Path<(String, String)>,
    correction: Result<Json<RecordCorrection>, JsonRejection>,
) -> Result<Json<ResultView>, ApiError> {
    let id = parse_submission_id(&id)?;
    let row = parse_row(&row)?;
    let Json(correction) = correction?;
    let result = ctx.core.pipeline.correction.resubmit(id, row, correction).await?;
    Ok(Json(ResultView::new(result)))
}

/// `POST /api/submissions/:id/confirm-all-warnings`
pub async fn confirm_all(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmAllReport>, ApiError> {
    let id = parse_submission_id(&id)?;
    Ok(Json(ctx.core.pipeline.confirmation.confirm_all(id).await?))
}
