//! Confirmation Engine: resolves pended rows with accept-and-confirm calls.

use std::sync::Arc;

use serde::Serialize;

use super::classifier::RecordClassifier;
use super::error::SubmissionError;
use super::retry::{with_backoff, RetryPolicy};
use super::store::{SubmissionEntry, SubmissionStore};
use super::types::{OutcomeBucket, RecordResult, SubmissionId};
use crate::models::AttemptKind;
use crate::registry::{EncounterRequest, RegistryClient, RegistryOutcome};

/// Per-row entry of a bulk confirmation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationOutcome {
    pub row_number: u32,
    pub confirmed: bool,
    /// Superseding result, when the registry answered.
    pub result: Option<RecordResult>,
    pub error: Option<String>,
}

/// `confirmed + failed == results.len()` always holds.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmAllReport {
    pub confirmed: usize,
    pub failed: usize,
    pub results: Vec<ConfirmationOutcome>,
}

#[derive(Clone)]
pub struct ConfirmationEngine {
    store: Arc<SubmissionStore>,
    registry: Arc<dyn RegistryClient>,
    classifier: Arc<RecordClassifier>,
    retry: RetryPolicy,
}

impl ConfirmationEngine {
    pub fn new(
        store: Arc<SubmissionStore>,
        registry: Arc<dyn RegistryClient>,
        classifier: Arc<RecordClassifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            classifier,
            retry,
        }
    }

    /// Confirm one pended row and store the registry's new answer in place
    /// of the old one. Rows not awaiting confirmation are left untouched.
    pub async fn confirm_one(&self, id: SubmissionId, row: u32) -> Result<RecordResult, SubmissionError> {
        let entry = self.store.get(id).await?;
        self.confirm_row(&entry, row).await
    }

    /// Confirm every row pending at call time, one after another. A failing
    /// row is reported and the rest still run.
    pub async fn confirm_all(&self, id: SubmissionId) -> Result<ConfirmAllReport, SubmissionError> {
        let entry = self.store.get(id).await?;
        let pending: Vec<u32> = entry
            .read()
            .await
            .rows
            .iter()
            .filter(|(_, s)| s.result.as_ref().is_some_and(RecordResult::is_pending))
            .map(|(row, _)| *row)
            .collect();

        tracing::info!(submission_id = %id, rows = pending.len(), "Confirming pending rows");
        let mut report = ConfirmAllReport::default();
        for row in pending {
            let outcome = match self.confirm_row(&entry, row).await {
                Ok(result) => ConfirmationOutcome {
                    row_number: row,
                    confirmed: is_resolved(&result),
                    result: Some(result),
                    error: None,
                },
                Err(e) => ConfirmationOutcome {
                    row_number: row,
                    confirmed: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            if outcome.confirmed {
                report.confirmed += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(outcome);
        }
        tracing::info!(
            submission_id = %id,
            confirmed = report.confirmed,
            failed = report.failed,
            "Bulk confirmation finished"
        );
        Ok(report)
    }

    async fn confirm_row(&self, entry: &SubmissionEntry, row: u32) -> Result<RecordResult, SubmissionError> {
        let id = entry.id();
        let (ticket, provider) = {
            let mut s = entry.write().await;
            let ticket = s.reserve_for_confirmation(row)?;
            (ticket, s.provider.clone())
        };

        let request = EncounterRequest::confirmation(
            &provider,
            &ticket.record,
            ticket.claim_id.as_deref(),
            ticket.claim_sequence_number.as_deref(),
        );
        let attempted = with_backoff(&self.retry, |_| self.registry.record_encounter(&request)).await;

        let response = match attempted.result {
            Ok(response) => response,
            Err(e) => {
                entry.write().await.release(row);
                tracing::warn!(submission_id = %id, row, error = %e, "Confirmation not delivered");
                return Err(e.into());
            }
        };

        let mut result = self
            .classifier
            .classify(row, RegistryOutcome::for_encounter(&response, 1));
        result.resubmit_count = ticket.resubmit_count;
        result.attempt = AttemptKind::Confirmation;
        result.delivery_uncertain = attempted.delivery_uncertain;

        entry.write().await.supersede(result.clone(), None)?;
        tracing::info!(
            submission_id = %id,
            row,
            status = %result.status,
            code = result.status_code.as_deref().unwrap_or_default(),
            "Row confirmed"
        );
        Ok(result)
    }
}

/// The registry accepted the confirmation outright.
fn is_resolved(result: &RecordResult) -> bool {
    result.bucket() == OutcomeBucket::Successful
}
