//! `GET /api/submissions/:id/results?status=&bucket=&page=&pageSize=`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;

use super::parse_submission_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::submission::{ResultsPage, ResultsQuery};

/// Paginated classified results, row order, with aggregate counts.
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Json<ResultsPage>, ApiError> {
    let id = parse_submission_id(&id)?;
    let Query(query) = query?;
    Ok(Json(ctx.core.pipeline.progress.results(id, &query).await?))
}
