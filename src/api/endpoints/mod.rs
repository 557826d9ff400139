//! API endpoint handlers, one module per resource.

pub mod export;
pub mod health;
pub mod records;
pub mod results;
pub mod submissions;
pub mod submit;

use crate::api::error::ApiError;
use crate::pipeline::submission::SubmissionId;

pub(crate) fn parse_submission_id(raw: &str) -> Result<SubmissionId, ApiError> {
    uuid::Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid submission ID: {e}")))
}

pub(crate) fn parse_row(raw: &str) -> Result<u32, ApiError> {
    raw.parse::<u32>()
        .map_err(|e| ApiError::BadRequest(format!("Invalid row number: {e}")))
}
