//! Progress Tracker: read-only views over stored submissions.
//!
//! Every view is built from one read-lock snapshot, so the counters in a
//! single response always add up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SubmissionError;
use super::state::Submission;
use super::store::SubmissionStore;
use super::types::{Batch, OutcomeBucket, RecordResult, SubmissionId};
use crate::models::{ActionRequired, BatchStatus, EncounterRecord, RecordStatus, SubmissionStatus};
use crate::registry::guidance;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub index: usize,
    pub status: BatchStatus,
    pub record_count: usize,
    pub episode_count: usize,
    pub attempts: u32,
    pub delivery_uncertain: bool,
    pub last_error: Option<String>,
    pub successful: usize,
    pub failed: usize,
    pub pending_confirmation: usize,
}

/// A row waiting on `confirm` or a correction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRow {
    pub row_number: u32,
    pub status: RecordStatus,
    pub action_required: ActionRequired,
    pub status_code: Option<String>,
    pub message: Option<String>,
    pub guidance: Option<&'static str>,
    pub claim_id: Option<String>,
    pub claim_sequence_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionProgress {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    pub total_batches: usize,
    /// Batches that reached a terminal state (completed or failed).
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub total_records: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending_confirmation: usize,
    /// Rows not yet sent (or in flight for the first time).
    pub not_dispatched: usize,
    pub delivery_uncertain: bool,
    pub batches: Vec<BatchProgress>,
    pub pending_rows: Vec<PendingRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row's current result, with guidance attached for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    #[serde(flatten)]
    pub result: RecordResult,
    pub guidance: Option<&'static str>,
}

impl ResultView {
    pub fn new(result: RecordResult) -> Self {
        let guidance = guidance_for(&result);
        Self { result, guidance }
    }
}

pub fn guidance_for(result: &RecordResult) -> Option<&'static str> {
    if result.status == RecordStatus::NotAttempted {
        return Some(guidance::NOT_ATTEMPTED);
    }
    result.status_code.as_deref().and_then(guidance::for_code)
}

/// Filter for `results`. `bucket` narrows to one aggregate counter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub status: Option<RecordStatus>,
    pub bucket: Option<BucketFilter>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketFilter {
    Successful,
    Failed,
    PendingConfirmation,
}

impl BucketFilter {
    fn matches(self, bucket: OutcomeBucket) -> bool {
        matches!(
            (self, bucket),
            (Self::Successful, OutcomeBucket::Successful)
                | (Self::Failed, OutcomeBucket::Failed)
                | (Self::PendingConfirmation, OutcomeBucket::PendingConfirmation)
        )
    }
}

/// Aggregate counters over every row, regardless of filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCounts {
    pub total_records: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending_confirmation: usize,
    pub not_dispatched: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    pub submission_id: SubmissionId,
    pub page: usize,
    pub page_size: usize,
    /// Rows matching the filter, across all pages.
    pub total: usize,
    pub counts: ResultCounts,
    pub results: Vec<ResultView>,
}

/// Everything known about one row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    pub row_number: u32,
    pub batch_index: usize,
    pub version: u32,
    pub in_flight: bool,
    pub record: EncounterRecord,
    pub current: Option<ResultView>,
    /// Superseded results, oldest first.
    pub history: Vec<ResultView>,
    pub updated_at: DateTime<Utc>,
}

// ── Snapshot ────────────────────────────────────────────────

fn batch_progress(submission: &Submission, batch: &Batch) -> BatchProgress {
    let mut view = BatchProgress {
        index: batch.index,
        status: batch.status,
        record_count: batch.record_count(),
        episode_count: batch.episode_count,
        attempts: batch.attempts,
        delivery_uncertain: batch.delivery_uncertain,
        last_error: batch.last_error.clone(),
        successful: 0,
        failed: 0,
        pending_confirmation: 0,
    };
    for result in batch
        .rows
        .iter()
        .filter_map(|r| submission.rows.get(r))
        .filter_map(|s| s.result.as_ref())
    {
        match result.bucket() {
            OutcomeBucket::Successful => view.successful += 1,
            OutcomeBucket::Failed => view.failed += 1,
            OutcomeBucket::PendingConfirmation => view.pending_confirmation += 1,
        }
    }
    view
}

impl Submission {
    pub fn progress(&self) -> SubmissionProgress {
        let batches: Vec<BatchProgress> = self.batches.iter().map(|b| batch_progress(self, b)).collect();

        let counts = self.counts();
        let pending_rows = self
            .rows
            .iter()
            .filter_map(|(row, state)| state.result.as_ref().map(|r| (*row, r)))
            .filter(|(_, result)| result.is_pending())
            .map(|(row_number, result)| PendingRow {
                row_number,
                status: result.status,
                action_required: result.action_required,
                status_code: result.status_code.clone(),
                message: result.message.clone(),
                guidance: guidance_for(result),
                claim_id: result.claim_id.clone(),
                claim_sequence_number: result.claim_sequence_number.clone(),
            })
            .collect();

        SubmissionProgress {
            submission_id: self.id,
            status: self.status(),
            total_batches: self.batches.len(),
            completed_batches: self.batches.iter().filter(|b| b.status.is_terminal()).count(),
            failed_batches: self
                .batches
                .iter()
                .filter(|b| b.status == BatchStatus::Failed)
                .count(),
            total_records: counts.total_records,
            successful: counts.successful,
            failed: counts.failed,
            pending_confirmation: counts.pending_confirmation,
            not_dispatched: counts.not_dispatched,
            delivery_uncertain: self.batches.iter().any(|b| b.delivery_uncertain),
            batches,
            pending_rows,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// `successful + failed + pending_confirmation + not_dispatched ==
    /// total_records` always holds.
    pub fn counts(&self) -> ResultCounts {
        let mut counts = ResultCounts {
            total_records: self.total_records(),
            ..Default::default()
        };
        for state in self.rows.values() {
            match state.result.as_ref().map(RecordResult::bucket) {
                None => counts.not_dispatched += 1,
                Some(OutcomeBucket::Successful) => counts.successful += 1,
                Some(OutcomeBucket::Failed) => counts.failed += 1,
                Some(OutcomeBucket::PendingConfirmation) => counts.pending_confirmation += 1,
            }
        }
        counts
    }

    pub fn results_page(&self, query: &ResultsQuery) -> ResultsPage {
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);

        let matching: Vec<&RecordResult> = self
            .rows
            .values()
            .filter_map(|s| s.result.as_ref())
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.bucket.map_or(true, |b| b.matches(r.bucket())))
            .collect();

        ResultsPage {
            submission_id: self.id,
            page,
            page_size,
            total: matching.len(),
            counts: self.counts(),
            results: matching
                .into_iter()
                .skip(page.saturating_sub(1).saturating_mul(page_size))
                .take(page_size)
                .cloned()
                .map(ResultView::new)
                .collect(),
        }
    }

    pub fn record_detail(&self, row: u32) -> Result<RecordDetail, SubmissionError> {
        let state = self.row(row)?;
        Ok(RecordDetail {
            row_number: row,
            batch_index: state.batch_index,
            version: state.version,
            in_flight: state.in_flight,
            record: state.record.clone(),
            current: state.result.clone().map(ResultView::new),
            history: state.history.iter().cloned().map(ResultView::new).collect(),
            updated_at: state.updated_at,
        })
    }
}

// ── Tracker ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<SubmissionStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<SubmissionStore>) -> Self {
        Self { store }
    }

    pub async fn get_progress(&self, id: SubmissionId) -> Result<SubmissionProgress, SubmissionError> {
        let entry = self.store.get(id).await?;
        let progress = entry.read().await.progress();
        Ok(progress)
    }

    pub async fn results(
        &self,
        id: SubmissionId,
        query: &ResultsQuery,
    ) -> Result<ResultsPage, SubmissionError> {
        let entry = self.store.get(id).await?;
        let page = entry.read().await.results_page(query);
        Ok(page)
    }

    pub async fn record(&self, id: SubmissionId, row: u32) -> Result<RecordDetail, SubmissionError> {
        let entry = self.store.get(id).await?;
        let detail = entry.read().await.record_detail(row);
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InformationProvider;
    use crate::pipeline::submission::testing::record;
    use uuid::Uuid;

    fn result(row: u32, status: RecordStatus, action: ActionRequired, code: &str) -> RecordResult {
        RecordResult {
            status,
            action_required: action,
            status_code: Some(code.into()),
            message: Some(format!("message for {code}")),
            failure_reason: None,
            ..RecordResult::not_attempted(row, "", false)
        }
    }

    /// Two batches: first answered (one row each bucket), second untouched.
    fn submission() -> Submission {
        let mut batches = vec![Batch::new(0, vec![1, 2, 3], 3), Batch::new(1, vec![4], 1)];
        for b in &mut batches {
            b.transition(BatchStatus::Validating).unwrap();
            b.transition(BatchStatus::Validated).unwrap();
        }
        let mut s = Submission::new(
            Uuid::new_v4(),
            "fp".into(),
            InformationProvider {
                provider_number: "2448141T".into(),
                hpio_number: None,
                hpii_number: None,
            },
            (1..=4).map(record).collect(),
            batches,
        )
        .unwrap();
        s.begin_batch(0).unwrap();
        s.complete_batch(
            0,
            1,
            false,
            vec![
                result(1, RecordStatus::Success, ActionRequired::None, "AIR-I-1000"),
                result(2, RecordStatus::Warning, ActionRequired::ConfirmOrCorrect, "AIR-W-1004"),
                result(3, RecordStatus::Error, ActionRequired::None, "AIR-E-1005"),
            ],
        )
        .unwrap();
        s
    }

    #[test]
    fn counters_partition_rows() {
        let p = submission().progress();
        assert_eq!(p.total_records, 4);
        assert_eq!((p.successful, p.failed, p.pending_confirmation, p.not_dispatched), (1, 1, 1, 1));
        assert_eq!(p.completed_batches, 1);
        assert_eq!(p.failed_batches, 0);
        assert_eq!(p.batches[0].successful, 1);
        assert_eq!(p.batches[1].status, BatchStatus::Validated);
        assert_eq!(p.status, SubmissionStatus::Running);
    }

    #[test]
    fn pending_rows_carry_claim_and_guidance() {
        let p = submission().progress();
        assert_eq!(p.pending_rows.len(), 1);
        let row = &p.pending_rows[0];
        assert_eq!(row.row_number, 2);
        assert_eq!(row.message.as_deref(), Some("message for AIR-W-1004"));
        assert!(row.guidance.is_some());
    }

    #[test]
    fn results_filter_and_paginate() {
        let s = submission();
        let all = s.results_page(&ResultsQuery::default());
        assert_eq!(all.total, 3);
        assert_eq!(all.counts.not_dispatched, 1);
        assert_eq!(all.counts.pending_confirmation, 1);

        let errors = s.results_page(&ResultsQuery {
            status: Some(RecordStatus::Error),
            ..Default::default()
        });
        assert_eq!(errors.total, 1);
        assert_eq!(errors.results[0].result.row_number, 3);

        let pending = s.results_page(&ResultsQuery {
            bucket: Some(BucketFilter::PendingConfirmation),
            ..Default::default()
        });
        assert_eq!(pending.results[0].result.row_number, 2);

        let second = s.results_page(&ResultsQuery {
            page: Some(2),
            page_size: Some(2),
            ..Default::default()
        });
        assert_eq!(second.total, 3);
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0].result.row_number, 3);
    }

    #[test]
    fn page_far_past_the_end_is_empty() {
        let page = submission().results_page(&ResultsQuery {
            page: Some(usize::MAX),
            page_size: Some(MAX_PAGE_SIZE),
            ..Default::default()
        });
        assert_eq!(page.page, usize::MAX);
        assert_eq!(page.total, 3);
        assert!(page.results.is_empty());
    }

    #[test]
    fn result_view_flattens_result() {
        let s = submission();
        let json = serde_json::to_value(s.record_detail(2).unwrap()).unwrap();
        assert_eq!(json["current"]["statusCode"], "AIR-W-1004");
        assert_eq!(json["current"]["actionRequired"], "CONFIRM_OR_CORRECT");
        assert!(json["current"]["guidance"].is_string());
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn not_attempted_rows_get_fixed_guidance() {
        let view = ResultView::new(RecordResult::not_attempted(1, "timed out", true));
        assert_eq!(view.guidance, Some(guidance::NOT_ATTEMPTED));
    }

    #[test]
    fn unknown_row_detail_is_not_found() {
        assert!(matches!(submission().record_detail(42), Err(SubmissionError::RowNotFound(42))));
    }
}
