//! `GET /api/submissions/:id/export?format=csv|json`

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::parse_submission_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::submission::ExportFormat;

#[derive(Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// Current state of every row as a download. Registry messages are
/// byte-identical to what the registry sent.
pub async fn download(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let id = parse_submission_id(&id)?;
    let Query(query) = query?;
    let document = ctx.core.pipeline.exporter.export(id, query.format).await?;
    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.body,
    )
        .into_response())
}
