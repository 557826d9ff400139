//! Per-submission state and every mutation allowed on it.
//!
//! Callers hold the submission's write lock while calling the `&mut self`
//! methods here; that lock is the single writer for counters and results.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::error::SubmissionError;
use super::types::{
    Batch, ConfirmationTicket, CorrectionTicket, OutcomeBucket, RecordResult, RowState, SubmissionId,
};
use crate::models::{BatchStatus, EncounterRecord, InformationProvider, SubmissionStatus};

/// Worker-facing run flag. `Finished` is set once, by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Finished,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: SubmissionId,
    pub fingerprint: String,
    pub provider: InformationProvider,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub batches: Vec<Batch>,
    pub rows: BTreeMap<u32, RowState>,
    pub run_state: RunState,
    /// The background worker died before finishing.
    pub worker_failed: bool,
}

impl Submission {
    /// Build state for validated, grouped records. Every row must appear in
    /// exactly one batch.
    pub fn new(
        id: SubmissionId,
        fingerprint: String,
        provider: InformationProvider,
        records: Vec<EncounterRecord>,
        batches: Vec<Batch>,
    ) -> Result<Self, SubmissionError> {
        let mut by_row: HashMap<u32, EncounterRecord> =
            records.into_iter().map(|r| (r.row_number, r)).collect();
        let mut rows = BTreeMap::new();
        for batch in &batches {
            for row in &batch.rows {
                let record = by_row.remove(row).ok_or_else(|| {
                    SubmissionError::Internal(format!("row {row} of batch {} has no record", batch.index))
                })?;
                rows.insert(*row, RowState::new(record, batch.index));
            }
        }
        if !by_row.is_empty() {
            return Err(SubmissionError::Internal(format!(
                "{} record(s) not assigned to any batch",
                by_row.len()
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            fingerprint,
            provider,
            created_at: now,
            updated_at: now,
            batches,
            rows,
            run_state: RunState::Running,
            worker_failed: false,
        })
    }

    pub fn total_records(&self) -> usize {
        self.rows.len()
    }

    pub fn status(&self) -> SubmissionStatus {
        match self.run_state {
            RunState::Running => SubmissionStatus::Running,
            RunState::Paused => SubmissionStatus::Paused,
            RunState::Finished => {
                let all_failed = !self.batches.is_empty()
                    && self.batches.iter().all(|b| b.status == BatchStatus::Failed);
                if self.worker_failed || all_failed {
                    SubmissionStatus::Error
                } else {
                    SubmissionStatus::Completed
                }
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.run_state == RunState::Paused
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ── Run control ──────────────────────────────────────────

    pub fn pause(&mut self) -> Result<SubmissionStatus, SubmissionError> {
        match self.run_state {
            RunState::Running | RunState::Paused => {
                self.run_state = RunState::Paused;
                self.touch();
                Ok(self.status())
            }
            RunState::Finished => Err(SubmissionError::InvalidTransition {
                action: "pause",
                status: self.status(),
            }),
        }
    }

    pub fn resume(&mut self) -> Result<SubmissionStatus, SubmissionError> {
        match self.run_state {
            RunState::Running | RunState::Paused => {
                self.run_state = RunState::Running;
                self.touch();
                Ok(self.status())
            }
            RunState::Finished => Err(SubmissionError::InvalidTransition {
                action: "resume",
                status: self.status(),
            }),
        }
    }

    pub fn mark_finished(&mut self) {
        self.run_state = RunState::Finished;
        self.touch();
    }

    /// The worker died: every batch it never finished is failed and its
    /// unanswered rows surface as not attempted.
    pub fn abandon(&mut self, reason: &str) {
        for batch in self.batches.iter_mut().filter(|b| !b.status.is_terminal()) {
            // Abandoned before or during submission.
            batch.status = BatchStatus::Failed;
            batch.last_error = Some(reason.to_string());
            for row in &batch.rows {
                if let Some(state) = self.rows.get_mut(row) {
                    if state.result.is_none() {
                        state.result = Some(RecordResult::not_attempted(*row, reason, batch.delivery_uncertain));
                    }
                    state.in_flight = false;
                }
            }
        }
        self.worker_failed = true;
        self.mark_finished();
    }

    // ── Batch dispatch ───────────────────────────────────────

    fn batch_mut(&mut self, index: usize) -> Result<&mut Batch, SubmissionError> {
        self.batches
            .get_mut(index)
            .ok_or_else(|| SubmissionError::Internal(format!("batch {index} does not exist")))
    }

    /// Move a batch to `submitting` and hand back its records in row order.
    pub fn begin_batch(&mut self, index: usize) -> Result<Vec<EncounterRecord>, SubmissionError> {
        let batch = self.batch_mut(index)?;
        batch.transition(BatchStatus::Submitting)?;
        let rows = batch.rows.clone();

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let state = self.rows.get_mut(&row).ok_or(SubmissionError::RowNotFound(row))?;
            state.in_flight = true;
            records.push(state.record.clone());
        }
        self.touch();
        Ok(records)
    }

    /// Store the classified results of a batch call (one per row).
    pub fn complete_batch(
        &mut self,
        index: usize,
        attempts: u32,
        delivery_uncertain: bool,
        results: Vec<RecordResult>,
    ) -> Result<(), SubmissionError> {
        let batch = self.batch_mut(index)?;
        batch.transition(BatchStatus::Completed)?;
        batch.attempts = attempts;
        batch.delivery_uncertain = delivery_uncertain;
        for result in results {
            self.store_result(result, None);
        }
        self.touch();
        Ok(())
    }

    /// Record a batch whose call never got an answer. Its rows are kept and
    /// marked not attempted.
    pub fn fail_batch(
        &mut self,
        index: usize,
        attempts: u32,
        delivery_uncertain: bool,
        reason: &str,
    ) -> Result<(), SubmissionError> {
        let batch = self.batch_mut(index)?;
        batch.transition(BatchStatus::Failed)?;
        batch.attempts = attempts;
        batch.delivery_uncertain = delivery_uncertain;
        batch.last_error = Some(reason.to_string());
        let rows = batch.rows.clone();
        for row in rows {
            self.store_result(RecordResult::not_attempted(row, reason, delivery_uncertain), None);
        }
        self.touch();
        Ok(())
    }

    // ── Row follow-up ────────────────────────────────────────

    pub fn row(&self, row: u32) -> Result<&RowState, SubmissionError> {
        self.rows.get(&row).ok_or(SubmissionError::RowNotFound(row))
    }

    /// Claim a pending row for an accept-and-confirm call.
    pub fn reserve_for_confirmation(&mut self, row: u32) -> Result<ConfirmationTicket, SubmissionError> {
        let state = self.rows.get_mut(&row).ok_or(SubmissionError::RowNotFound(row))?;
        let result = state
            .result
            .as_ref()
            .filter(|r| r.is_pending())
            .ok_or(SubmissionError::NotConfirmable(row))?;
        if state.in_flight {
            return Err(SubmissionError::RowBusy(row));
        }
        let ticket = ConfirmationTicket {
            record: state.record.clone(),
            claim_id: result.claim_id.clone(),
            claim_sequence_number: result.claim_sequence_number.clone(),
            resubmit_count: result.resubmit_count,
        };
        state.in_flight = true;
        Ok(ticket)
    }

    /// Claim a row that has a registry answer it can still be corrected from.
    pub fn reserve_for_correction(&mut self, row: u32) -> Result<CorrectionTicket, SubmissionError> {
        let state = self.rows.get_mut(&row).ok_or(SubmissionError::RowNotFound(row))?;
        let result = state.result.as_ref().ok_or_else(|| SubmissionError::NotCorrectable {
            row,
            reason: "row has not been dispatched yet".into(),
        })?;
        if result.bucket() == OutcomeBucket::Successful {
            return Err(SubmissionError::NotCorrectable {
                row,
                reason: format!("row was already recorded ({})", result.status),
            });
        }
        if state.in_flight {
            return Err(SubmissionError::RowBusy(row));
        }
        let ticket = CorrectionTicket {
            record: state.record.clone(),
            resubmit_count: result.resubmit_count,
        };
        state.in_flight = true;
        Ok(ticket)
    }

    /// Give a reserved row back without changing it.
    pub fn release(&mut self, row: u32) {
        if let Some(state) = self.rows.get_mut(&row) {
            state.in_flight = false;
        }
    }

    /// Replace the current result of a row, keeping the old one in history.
    /// A corrected record becomes the row's new encounter version.
    pub fn supersede(
        &mut self,
        result: RecordResult,
        corrected: Option<EncounterRecord>,
    ) -> Result<(), SubmissionError> {
        if !self.rows.contains_key(&result.row_number) {
            return Err(SubmissionError::RowNotFound(result.row_number));
        }
        self.store_result(result, corrected);
        self.touch();
        Ok(())
    }

    fn store_result(&mut self, result: RecordResult, corrected: Option<EncounterRecord>) {
        let Some(state) = self.rows.get_mut(&result.row_number) else {
            return;
        };
        if let Some(previous) = state.result.take() {
            state.history.push(previous);
        }
        if let Some(record) = corrected {
            state.record = record;
            state.version += 1;
        }
        state.result = Some(result);
        state.in_flight = false;
        state.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionRequired, RecordStatus};
    use crate::pipeline::submission::testing::record;
    use uuid::Uuid;

    fn submission(rows_per_batch: &[&[u32]]) -> Submission {
        let batches: Vec<Batch> = rows_per_batch
            .iter()
            .enumerate()
            .map(|(i, rows)| {
                let mut b = Batch::new(i, rows.to_vec(), rows.len());
                b.transition(BatchStatus::Validating).unwrap();
                b.transition(BatchStatus::Validated).unwrap();
                b
            })
            .collect();
        let records = rows_per_batch.iter().flat_map(|r| r.iter().map(|n| record(*n))).collect();
        Submission::new(
            Uuid::new_v4(),
            "fp".into(),
            InformationProvider {
                provider_number: "2448141T".into(),
                hpio_number: None,
                hpii_number: None,
            },
            records,
            batches,
        )
        .unwrap()
    }

    fn pending(row: u32) -> RecordResult {
        RecordResult {
            row_number: row,
            status: RecordStatus::Warning,
            action_required: ActionRequired::ConfirmOrCorrect,
            status_code: Some("AIR-W-1004".into()),
            message: Some("Individual was not found.".into()),
            claim_id: Some("C1".into()),
            claim_sequence_number: Some("1".into()),
            failure_reason: None,
            ..RecordResult::not_attempted(row, "", false)
        }
    }

    #[test]
    fn every_row_must_belong_to_a_batch() {
        let err = Submission::new(
            Uuid::new_v4(),
            "fp".into(),
            InformationProvider {
                provider_number: "2448141T".into(),
                hpio_number: None,
                hpii_number: None,
            },
            vec![record(1), record(2)],
            vec![Batch::new(0, vec![1], 1)],
        )
        .unwrap_err();
        assert!(matches!(err, SubmissionError::Internal(_)));
    }

    #[test]
    fn begin_batch_marks_rows_in_flight() {
        let mut s = submission(&[&[1, 2], &[3]]);
        let records = s.begin_batch(0).unwrap();
        assert_eq!(records.iter().map(|r| r.row_number).collect::<Vec<_>>(), vec![1, 2]);
        assert!(s.row(1).unwrap().in_flight);
        assert!(!s.row(3).unwrap().in_flight);
        assert_eq!(s.batches[0].status, BatchStatus::Submitting);
        assert!(s.begin_batch(0).is_err());
    }

    #[test]
    fn failed_batch_rows_are_not_attempted() {
        let mut s = submission(&[&[1, 2]]);
        s.begin_batch(0).unwrap();
        s.fail_batch(0, 3, true, "Registry call timed out after 30s").unwrap();
        for row in [1, 2] {
            let result = s.row(row).unwrap().result.clone().unwrap();
            assert_eq!(result.status, RecordStatus::NotAttempted);
            assert!(result.delivery_uncertain);
            assert!(!s.row(row).unwrap().in_flight);
        }
        assert_eq!(s.batches[0].attempts, 3);
        s.mark_finished();
        assert_eq!(s.status(), SubmissionStatus::Error);
    }

    #[test]
    fn pause_and_resume_rules() {
        let mut s = submission(&[&[1]]);
        assert_eq!(s.pause().unwrap(), SubmissionStatus::Paused);
        assert_eq!(s.pause().unwrap(), SubmissionStatus::Paused);
        assert_eq!(s.resume().unwrap(), SubmissionStatus::Running);
        s.mark_finished();
        assert!(matches!(
            s.pause(),
            Err(SubmissionError::InvalidTransition { action: "pause", .. })
        ));
        assert!(s.resume().is_err());
    }

    #[test]
    fn confirmation_reservation_rules() {
        let mut s = submission(&[&[1, 2]]);
        assert!(matches!(s.reserve_for_confirmation(1), Err(SubmissionError::NotConfirmable(1))));
        assert!(matches!(s.reserve_for_confirmation(9), Err(SubmissionError::RowNotFound(9))));

        s.begin_batch(0).unwrap();
        let ok = RecordResult {
            status: RecordStatus::Success,
            status_code: Some("AIR-I-1000".into()),
            failure_reason: None,
            ..RecordResult::not_attempted(2, "", false)
        };
        s.complete_batch(0, 1, false, vec![pending(1), ok]).unwrap();

        let ticket = s.reserve_for_confirmation(1).unwrap();
        assert_eq!(ticket.claim_id.as_deref(), Some("C1"));
        assert!(matches!(s.reserve_for_confirmation(1), Err(SubmissionError::RowBusy(1))));
        s.release(1);
        assert!(s.reserve_for_confirmation(1).is_ok());

        let before = s.row(2).unwrap().clone();
        assert!(matches!(s.reserve_for_confirmation(2), Err(SubmissionError::NotConfirmable(2))));
        assert_eq!(s.row(2).unwrap(), &before);
    }

    #[test]
    fn correction_reservation_rejects_recorded_rows() {
        let mut s = submission(&[&[1, 2]]);
        assert!(matches!(s.reserve_for_correction(1), Err(SubmissionError::NotCorrectable { .. })));
        s.begin_batch(0).unwrap();
        let ok = RecordResult {
            status: RecordStatus::Success,
            failure_reason: None,
            ..RecordResult::not_attempted(2, "", false)
        };
        s.complete_batch(0, 1, false, vec![RecordResult::not_attempted(1, "x", false), ok]).unwrap();
        assert!(s.reserve_for_correction(1).is_ok());
        assert!(matches!(s.reserve_for_correction(2), Err(SubmissionError::NotCorrectable { row: 2, .. })));
    }

    #[test]
    fn supersede_keeps_history_and_bumps_version() {
        let mut s = submission(&[&[1]]);
        s.begin_batch(0).unwrap();
        s.complete_batch(0, 1, false, vec![pending(1)]).unwrap();

        let mut corrected = record(1);
        corrected.individual.first_name = Some("Janet".into());
        let mut next = pending(1);
        next.resubmit_count = 1;
        s.supersede(next.clone(), Some(corrected.clone())).unwrap();

        let row = s.row(1).unwrap();
        assert_eq!(row.result.as_ref(), Some(&next));
        assert_eq!(row.history, vec![pending(1)]);
        assert_eq!(row.version, 2);
        assert_eq!(row.record, corrected);
    }

    #[test]
    fn abandon_fails_unfinished_batches() {
        let mut s = submission(&[&[1], &[2]]);
        s.begin_batch(0).unwrap();
        s.complete_batch(0, 1, false, vec![pending(1)]).unwrap();
        s.abandon("worker stopped");
        assert_eq!(s.batches[1].status, BatchStatus::Failed);
        assert_eq!(s.row(2).unwrap().result.as_ref().unwrap().status, RecordStatus::NotAttempted);
        assert_eq!(s.status(), SubmissionStatus::Error);
    }
}
