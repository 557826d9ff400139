//! Core types of the submission pipeline.
//!
//! Lifecycle of one row:
//! validated record → batch → registry call → Record Result →
//! (confirmation | correction) → superseding Record Result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SubmissionError;
use crate::models::{
    ActionRequired, AttemptKind, BatchStatus, EncounterRecord, RecordStatus,
};
use crate::registry::EpisodeOutcome;

pub type SubmissionId = Uuid;

pub fn new_submission_id() -> SubmissionId {
    Uuid::new_v4()
}

// ═══════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════

/// Rows sent to the registry in one call, in original row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub index: usize,
    pub rows: Vec<u32>,
    pub episode_count: usize,
    pub status: BatchStatus,
    pub attempts: u32,
    /// An attempt timed out; the registry may hold a copy of this batch.
    pub delivery_uncertain: bool,
    pub last_error: Option<String>,
}

impl Batch {
    pub fn new(index: usize, rows: Vec<u32>, episode_count: usize) -> Self {
        Self {
            index,
            rows,
            episode_count,
            status: BatchStatus::Draft,
            attempts: 0,
            delivery_uncertain: false,
            last_error: None,
        }
    }

    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    pub fn transition(&mut self, next: BatchStatus) -> Result<(), SubmissionError> {
        if !self.status.can_transition_to(next) {
            return Err(SubmissionError::BatchTransition {
                index: self.index,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Record Result
// ═══════════════════════════════════════════

/// Classified outcome of one registry attempt for one row.
///
/// `status_code` and `message` are exactly what the registry sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResult {
    pub row_number: u32,
    pub status: RecordStatus,
    pub action_required: ActionRequired,
    pub status_code: Option<String>,
    pub message: Option<String>,
    pub claim_id: Option<String>,
    pub claim_sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<EpisodeOutcome>,
    pub resubmit_count: u32,
    pub attempt: AttemptKind,
    /// Why the registry was never reached (transport failures only).
    pub failure_reason: Option<String>,
    pub delivery_uncertain: bool,
}

/// Which aggregate counter a result falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeBucket {
    Successful,
    Failed,
    PendingConfirmation,
}

impl RecordResult {
    /// Row of a batch whose call never got a registry answer.
    pub fn not_attempted(row_number: u32, reason: impl Into<String>, delivery_uncertain: bool) -> Self {
        Self {
            row_number,
            status: RecordStatus::NotAttempted,
            action_required: ActionRequired::None,
            status_code: None,
            message: None,
            claim_id: None,
            claim_sequence_number: None,
            episodes: Vec::new(),
            resubmit_count: 0,
            attempt: AttemptKind::Initial,
            failure_reason: Some(reason.into()),
            delivery_uncertain,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.action_required == ActionRequired::ConfirmOrCorrect
    }

    pub fn bucket(&self) -> OutcomeBucket {
        if self.is_pending() {
            return OutcomeBucket::PendingConfirmation;
        }
        match self.status {
            RecordStatus::Success | RecordStatus::Warning => OutcomeBucket::Successful,
            RecordStatus::Error | RecordStatus::NotAttempted => OutcomeBucket::Failed,
        }
    }
}

// ═══════════════════════════════════════════
// Row state
// ═══════════════════════════════════════════

/// Everything stored about one input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowState {
    /// Current version of the record (replaced by corrections).
    pub record: EncounterRecord,
    pub version: u32,
    pub batch_index: usize,
    pub result: Option<RecordResult>,
    /// Superseded results, oldest first.
    pub history: Vec<RecordResult>,
    /// A registry call for this row is outstanding.
    pub in_flight: bool,
    pub updated_at: DateTime<Utc>,
}

impl RowState {
    pub fn new(record: EncounterRecord, batch_index: usize) -> Self {
        Self {
            record,
            version: 1,
            batch_index,
            result: None,
            history: Vec::new(),
            in_flight: false,
            updated_at: Utc::now(),
        }
    }
}

/// What the confirmation engine needs to build an accept-and-confirm call.
#[derive(Debug, Clone)]
pub struct ConfirmationTicket {
    pub record: EncounterRecord,
    pub claim_id: Option<String>,
    pub claim_sequence_number: Option<String>,
    pub resubmit_count: u32,
}

/// What the correction engine needs to build a fresh call.
#[derive(Debug, Clone)]
pub struct CorrectionTicket {
    pub record: EncounterRecord,
    pub resubmit_count: u32,
}
