//! Submission Dispatcher: accepts a record set, then drives its batches
//! through the registry on a background worker.
//!
//! Batches go out in order. With `dispatch_concurrency > 1` a window of
//! batches is in flight at once; the pause flag is checked between windows
//! and never interrupts an outbound call.

use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::classifier::RecordClassifier;
use super::error::SubmissionError;
use super::fingerprint::fingerprint;
use super::grouper::{self, GroupingLimits};
use super::retry::{with_backoff, RetryPolicy};
use super::state::Submission;
use super::store::{Inserted, SubmissionEntry, SubmissionStore};
use super::types::{new_submission_id, SubmissionId};
use super::validation;
use crate::config::PipelineSettings;
use crate::models::{BatchStatus, EncounterRecord, InformationProvider, SubmissionStatus};
use crate::registry::{EncounterRequest, RegistryClient, RegistryOutcome};

/// Body of `POST /submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub information_provider: InformationProvider,
    pub records: Vec<EncounterRecord>,
}

/// Handle returned by `start`, before any batch has been sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReceipt {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    pub total_batches: usize,
    pub total_records: usize,
    /// The same payload was already submitted; this is that submission.
    pub deduplicated: bool,
}

#[derive(Clone)]
pub struct SubmissionDispatcher {
    store: Arc<SubmissionStore>,
    registry: Arc<dyn RegistryClient>,
    classifier: Arc<RecordClassifier>,
    limits: GroupingLimits,
    retry: RetryPolicy,
    concurrency: usize,
}

impl SubmissionDispatcher {
    pub fn new(
        store: Arc<SubmissionStore>,
        registry: Arc<dyn RegistryClient>,
        classifier: Arc<RecordClassifier>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            store,
            registry,
            classifier,
            limits: settings.limits,
            retry: settings.retry,
            concurrency: settings.dispatch_concurrency.max(1),
        }
    }

    /// Validate, group and store a record set, then start dispatching it in
    /// the background. Returns as soon as the submission is stored.
    pub async fn start(&self, request: StartRequest) -> Result<StartReceipt, SubmissionError> {
        self.start_on(request, validation::today()).await
    }

    pub async fn start_on(
        &self,
        request: StartRequest,
        today: NaiveDate,
    ) -> Result<StartReceipt, SubmissionError> {
        let StartRequest {
            information_provider,
            records,
        } = request;

        if records.is_empty() {
            return Err(SubmissionError::Empty);
        }
        let provider_problems = validation::validate_provider(&information_provider);
        if !provider_problems.is_empty() {
            return Err(SubmissionError::InvalidProvider(provider_problems));
        }

        let mut batches = grouper::group(&records, &self.limits)?;
        for batch in &mut batches {
            batch.transition(BatchStatus::Validating)?;
        }
        validation::validate_records(&records, today)?;
        for batch in &mut batches {
            batch.transition(BatchStatus::Validated)?;
        }

        let fingerprint = fingerprint(&information_provider, &records)?;
        let submission = Submission::new(
            new_submission_id(),
            fingerprint,
            information_provider,
            records,
            batches,
        )?;

        match self.store.insert_unique(submission).await {
            Inserted::Existing(entry) => {
                let s = entry.read().await;
                tracing::info!(submission_id = %s.id, "Duplicate submission payload, returning existing submission");
                Ok(StartReceipt {
                    submission_id: s.id,
                    status: s.status(),
                    total_batches: s.batches.len(),
                    total_records: s.total_records(),
                    deduplicated: true,
                })
            }
            Inserted::New(entry) => {
                let receipt = {
                    let s = entry.read().await;
                    StartReceipt {
                        submission_id: s.id,
                        status: s.status(),
                        total_batches: s.batches.len(),
                        total_records: s.total_records(),
                        deduplicated: false,
                    }
                };
                tracing::info!(
                    submission_id = %receipt.submission_id,
                    batches = receipt.total_batches,
                    records = receipt.total_records,
                    "Submission accepted"
                );
                self.spawn_worker(entry);
                Ok(receipt)
            }
        }
    }

    pub async fn pause(&self, id: SubmissionId) -> Result<SubmissionStatus, SubmissionError> {
        let entry = self.store.get(id).await?;
        let status = entry.write().await.pause()?;
        tracing::info!(submission_id = %id, "Submission paused");
        Ok(status)
    }

    pub async fn resume(&self, id: SubmissionId) -> Result<SubmissionStatus, SubmissionError> {
        let entry = self.store.get(id).await?;
        let status = entry.write().await.resume()?;
        entry.notify_resumed();
        tracing::info!(submission_id = %id, "Submission resumed");
        Ok(status)
    }

    fn spawn_worker(&self, entry: Arc<SubmissionEntry>) {
        let worker = self.clone();
        let watched = entry.clone();
        let handle = tokio::spawn(async move { worker.run(entry).await });
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                tracing::error!(submission_id = %watched.id(), error = %e, "Dispatch worker stopped unexpectedly");
                watched
                    .write()
                    .await
                    .abandon(&format!("dispatch worker stopped: {e}"));
            }
        });
    }

    async fn run(self, entry: Arc<SubmissionEntry>) {
        let id = entry.id();
        let total = entry.read().await.batches.len();
        tracing::debug!(submission_id = %id, batches = total, concurrency = self.concurrency, "Dispatch worker started");

        let mut next = 0;
        while next < total {
            entry.wait_while_paused().await;
            let end = (next + self.concurrency).min(total);
            if end - next == 1 {
                self.dispatch_batch(&entry, next).await;
            } else {
                join_all((next..end).map(|i| self.dispatch_batch(&entry, i))).await;
            }
            next = end;
        }

        let mut s = entry.write().await;
        s.mark_finished();
        tracing::info!(submission_id = %id, status = %s.status(), "Dispatch finished");
    }

    /// One registry call for one batch, with retries. Never fails the
    /// worker: every outcome is written back to the batch and its rows.
    async fn dispatch_batch(&self, entry: &SubmissionEntry, index: usize) {
        let id = entry.id();
        let (records, provider) = {
            let mut s = entry.write().await;
            match s.begin_batch(index) {
                Ok(records) => (records, s.provider.clone()),
                Err(e) => {
                    tracing::error!(submission_id = %id, batch = index, error = %e, "Batch could not start");
                    return;
                }
            }
        };

        tracing::debug!(submission_id = %id, batch = index, rows = records.len(), "Submitting batch");
        let refs: Vec<&EncounterRecord> = records.iter().collect();
        let request = EncounterRequest::submission(&provider, &refs);
        let attempted = with_backoff(&self.retry, |_| self.registry.record_encounter(&request)).await;

        let mut s = entry.write().await;
        let stored = match attempted.result {
            Ok(response) => {
                let results = records
                    .iter()
                    .enumerate()
                    .map(|(pos, record)| {
                        let outcome = RegistryOutcome::for_encounter(&response, pos as u32 + 1);
                        let mut result = self.classifier.classify(record.row_number, outcome);
                        result.delivery_uncertain = attempted.delivery_uncertain;
                        result
                    })
                    .collect();
                tracing::info!(
                    submission_id = %id,
                    batch = index,
                    code = %response.status_code,
                    attempts = attempted.attempts,
                    "Batch completed"
                );
                s.complete_batch(index, attempted.attempts, attempted.delivery_uncertain, results)
            }
            Err(e) => {
                tracing::warn!(
                    submission_id = %id,
                    batch = index,
                    attempts = attempted.attempts,
                    delivery_uncertain = attempted.delivery_uncertain,
                    error = %e,
                    "Batch failed, rows not attempted"
                );
                s.fail_batch(index, attempted.attempts, attempted.delivery_uncertain, &e.to_string())
            }
        };
        if let Err(e) = stored {
            tracing::error!(submission_id = %id, batch = index, error = %e, "Batch result could not be stored");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{ActionRequired, RecordStatus};
    use crate::pipeline::submission::testing::{
        own_individual, pipeline, provider, record, record_for, settings, uniform, wait_for,
        wait_until_finished,
    };
    use crate::registry::{MockRegistryClient, MockReply, TransportError};

    fn request(records: Vec<EncounterRecord>) -> StartRequest {
        StartRequest {
            information_provider: provider(),
            records,
        }
    }

    #[tokio::test]
    async fn start_returns_handle_and_completes() {
        let mock = Arc::new(MockRegistryClient::new());
        let p = pipeline(mock.clone(), &settings(2));

        let receipt = p
            .dispatcher
            .start(request((1..=5).map(record).collect()))
            .await
            .unwrap();
        assert_eq!(receipt.total_batches, 3);
        assert_eq!(receipt.total_records, 5);
        assert!(!receipt.deduplicated);

        let progress = wait_until_finished(&p, receipt.submission_id).await;
        assert_eq!(progress.status, SubmissionStatus::Completed);
        assert_eq!(progress.completed_batches, 3);
        assert_eq!(progress.successful, 5);
        assert_eq!(
            progress.successful + progress.failed + progress.pending_confirmation,
            progress.total_records
        );
        assert_eq!(mock.call_count().await, 3);
    }

    #[tokio::test]
    async fn repeated_start_is_deduplicated() {
        let mock = Arc::new(MockRegistryClient::new());
        let p = pipeline(mock.clone(), &settings(10));

        let first = p.dispatcher.start(request(vec![record(1), record(2)])).await.unwrap();
        wait_until_finished(&p, first.submission_id).await;
        let second = p.dispatcher.start(request(vec![record(1), record(2)])).await.unwrap();

        assert_eq!(first.submission_id, second.submission_id);
        assert!(second.deduplicated);
        assert_eq!(second.status, SubmissionStatus::Completed);
        assert_eq!(mock.call_count().await, 1);
        assert_eq!(p.store.len().await, 1);
    }

    #[tokio::test]
    async fn empty_request_rejected() {
        let p = pipeline(Arc::new(MockRegistryClient::new()), &settings(10));
        assert!(matches!(
            p.dispatcher.start(request(vec![])).await,
            Err(SubmissionError::Empty)
        ));
    }

    #[tokio::test]
    async fn invalid_records_rejected_before_anything_is_stored() {
        let mock = Arc::new(MockRegistryClient::new());
        let p = pipeline(mock.clone(), &settings(10));
        let mut bad = record(2);
        bad.individual.ihi_number = None;

        let err = p
            .dispatcher
            .start(request(vec![record(1), bad]))
            .await
            .unwrap_err();
        let SubmissionError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.rows.len(), 1);
        assert_eq!(v.rows[0].row_number, 2);
        assert!(p.store.is_empty().await);
        assert_eq!(mock.call_count().await, 0);
    }

    #[tokio::test]
    async fn oversized_record_is_a_grouping_error() {
        let p = pipeline(Arc::new(MockRegistryClient::new()), &settings(10));
        let err = p
            .dispatcher
            .start(request(vec![record(1), record_for(2, "Citizen", 21)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Grouping(_)), "{err:?}");
    }

    #[tokio::test]
    async fn invalid_provider_rejected() {
        let p = pipeline(Arc::new(MockRegistryClient::new()), &settings(10));
        let mut req = request(vec![record(1)]);
        req.information_provider.provider_number = "nope".into();
        assert!(matches!(
            p.dispatcher.start(req).await,
            Err(SubmissionError::InvalidProvider(_))
        ));
    }

    #[tokio::test]
    async fn three_timeouts_fail_batch_and_later_batches_still_dispatch() {
        let mock = Arc::new(MockRegistryClient::new());
        for _ in 0..3 {
            mock.push(MockReply::Fail(TransportError::Timeout(30))).await;
        }
        let p = pipeline(mock.clone(), &settings(2));

        let receipt = p
            .dispatcher
            .start(request((1..=4).map(record).collect()))
            .await
            .unwrap();
        let progress = wait_until_finished(&p, receipt.submission_id).await;

        assert_eq!(progress.batches[0].status, BatchStatus::Failed);
        assert_eq!(progress.batches[0].attempts, 3);
        assert!(progress.batches[0].delivery_uncertain);
        assert_eq!(progress.batches[1].status, BatchStatus::Completed);
        assert_eq!(mock.call_count().await, 4);

        let entry = p.store.get(receipt.submission_id).await.unwrap();
        let s = entry.read().await;
        for row in [1, 2] {
            let result = s.row(row).unwrap().result.as_ref().unwrap();
            assert_eq!(result.status, RecordStatus::NotAttempted);
            assert!(result.failure_reason.as_deref().unwrap().contains("timed out"));
        }
        assert_eq!(progress.status, SubmissionStatus::Completed);
        assert_eq!(progress.failed, 2);
        assert_eq!(progress.successful, 2);
    }

    #[tokio::test]
    async fn every_batch_failing_ends_in_error() {
        let mock = Arc::new(MockRegistryClient::with_responder(|_| {
            MockReply::Fail(TransportError::Connection("http://air".into()))
        }));
        let p = pipeline(mock, &settings(10));
        let receipt = p.dispatcher.start(request(vec![record(1)])).await.unwrap();
        let progress = wait_until_finished(&p, receipt.submission_id).await;
        assert_eq!(progress.status, SubmissionStatus::Error);
        assert_eq!(progress.failed, 1);
    }

    #[tokio::test]
    async fn pause_after_second_of_five_batches() {
        let mock = Arc::new(MockRegistryClient::new());
        let release = mock.hold_call(2).await;
        let p = pipeline(mock.clone(), &settings(10));

        let receipt = p
            .dispatcher
            .start(request((1..=5).map(own_individual).collect()))
            .await
            .unwrap();
        assert_eq!(receipt.total_batches, 5);
        let id = receipt.submission_id;

        while mock.call_count().await < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(p.dispatcher.pause(id).await.unwrap(), SubmissionStatus::Paused);
        release.send(()).unwrap();

        let paused = wait_for(&p, id, |prog| prog.completed_batches == 2).await;
        assert_eq!(paused.status, SubmissionStatus::Paused);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(mock.call_count().await, 2);
        let still = p.progress.get_progress(id).await.unwrap();
        assert_eq!(still.completed_batches, 2);
        assert_eq!(still.batches[2].status, BatchStatus::Validated);

        p.dispatcher.resume(id).await.unwrap();
        let done = wait_until_finished(&p, id).await;
        assert_eq!(done.completed_batches, 5);
        assert_eq!(done.status, SubmissionStatus::Completed);
        assert_eq!(mock.call_count().await, 5);
    }

    #[tokio::test]
    async fn pause_after_completion_is_rejected() {
        let p = pipeline(Arc::new(MockRegistryClient::new()), &settings(10));
        let receipt = p.dispatcher.start(request(vec![record(1)])).await.unwrap();
        wait_until_finished(&p, receipt.submission_id).await;
        assert!(matches!(
            p.dispatcher.pause(receipt.submission_id).await,
            Err(SubmissionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn bounded_concurrency_dispatches_every_batch() {
        let mock = Arc::new(MockRegistryClient::new());
        let mut s = settings(1);
        s.dispatch_concurrency = 3;
        let p = pipeline(mock.clone(), &s);

        let receipt = p
            .dispatcher
            .start(request((1..=7).map(own_individual).collect()))
            .await
            .unwrap();
        let progress = wait_until_finished(&p, receipt.submission_id).await;
        assert_eq!(progress.completed_batches, 7);
        assert_eq!(progress.successful, 7);
        assert_eq!(mock.call_count().await, 7);
    }

    #[tokio::test]
    async fn partial_batch_response_is_classified_per_row() {
        let mock = Arc::new(MockRegistryClient::with_responder(|req| {
            let mut resp = uniform(req, "AIR-I-1000", "Encounter was recorded.", None);
            resp.status_code = "AIR-W-1008".into();
            resp.message = "Not all encounters were processed.".into();
            resp.claim_details = Some(crate::registry::wire::ClaimDetails {
                claim_id: "WC1".into(),
                claim_date: None,
            });
            if let Some(second) = resp.encounters.get_mut(1) {
                second.claim_sequence_number = Some("2".into());
                second.information = Some(crate::registry::wire::Information {
                    status: None,
                    code: "AIR-W-0044".into(),
                    text: "Episode pended.".into(),
                });
            }
            MockReply::Respond(resp)
        }));
        let p = pipeline(mock, &settings(10));
        let receipt = p.dispatcher.start(request(vec![record(1), record(2)])).await.unwrap();
        let progress = wait_until_finished(&p, receipt.submission_id).await;

        assert_eq!(progress.successful, 1);
        assert_eq!(progress.pending_confirmation, 1);
        assert_eq!(progress.pending_rows.len(), 1);
        let pending = &progress.pending_rows[0];
        assert_eq!(pending.row_number, 2);
        assert_eq!(pending.claim_id.as_deref(), Some("WC1"));
        assert_eq!(pending.claim_sequence_number.as_deref(), Some("2"));
        assert_eq!(pending.action_required, ActionRequired::ConfirmOrCorrect);
    }
}
