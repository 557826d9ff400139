//! Error types for the submission pipeline.
//!
//! Validation and grouping errors always name the rows involved so a caller
//! can tell exactly which records need attention.

use serde::Serialize;
use thiserror::Error;

use super::types::SubmissionId;
use crate::models::{BatchStatus, SubmissionStatus};
use crate::registry::TransportError;

/// One field-level problem on one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowViolations {
    pub row_number: u32,
    pub violations: Vec<FieldViolation>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} record(s) failed validation", .rows.len())]
pub struct ValidationError {
    pub rows: Vec<RowViolations>,
}

/// A record whose episodes alone exceed what one registry call may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOverflow {
    pub row_number: u32,
    pub episode_count: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    #[error("{} record(s) exceed the per-request episode ceiling of {ceiling}", .rows.len())]
    EpisodeCeilingExceeded {
        ceiling: usize,
        rows: Vec<RowOverflow>,
    },
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Submission not found: {0}")]
    NotFound(SubmissionId),

    #[error("Row {0} not found in submission")]
    RowNotFound(u32),

    #[error("Row {0} does not require confirmation")]
    NotConfirmable(u32),

    #[error("Row {row} cannot be corrected: {reason}")]
    NotCorrectable { row: u32, reason: String },

    #[error("Row {0} has a registry call in flight")]
    RowBusy(u32),

    #[error("Cannot {action} a submission that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SubmissionStatus,
    },

    #[error("Batch {index} cannot move from {from} to {to}")]
    BatchTransition {
        index: usize,
        from: BatchStatus,
        to: BatchStatus,
    },

    #[error("No records to submit")]
    Empty,

    #[error("Invalid information provider ({} problem(s))", .0.len())]
    InvalidProvider(Vec<FieldViolation>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error("Registry unavailable: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}
