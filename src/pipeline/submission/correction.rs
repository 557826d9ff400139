//! Correction Engine: resubmits one corrected row as a fresh registry call.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use super::classifier::RecordClassifier;
use super::error::{RowViolations, SubmissionError, ValidationError};
use super::grouper::{check_record, GroupingLimits};
use super::retry::{with_backoff, RetryPolicy};
use super::store::SubmissionStore;
use super::types::{RecordResult, SubmissionId};
use super::validation;
use crate::config::PipelineSettings;
use crate::models::{AttemptKind, EncounterRecord, Episode, IndividualIdentifier};
use crate::registry::{EncounterRequest, RegistryClient, RegistryOutcome};

/// Corrected fields for one row. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCorrection {
    pub individual: Option<IndividualIdentifier>,
    pub date_of_service: Option<NaiveDate>,
    pub episodes: Option<Vec<Episode>>,
    pub immunising_provider: Option<String>,
}

impl RecordCorrection {
    pub fn apply(self, mut record: EncounterRecord) -> EncounterRecord {
        if let Some(individual) = self.individual {
            record.individual = individual;
        }
        if let Some(date) = self.date_of_service {
            record.encounter.date_of_service = date;
        }
        if let Some(episodes) = self.episodes {
            record.encounter.episodes = episodes;
        }
        if let Some(provider) = self.immunising_provider {
            record.encounter.immunising_provider = Some(provider);
        }
        record
    }
}

#[derive(Clone)]
pub struct CorrectionEngine {
    store: Arc<SubmissionStore>,
    registry: Arc<dyn RegistryClient>,
    classifier: Arc<RecordClassifier>,
    limits: GroupingLimits,
    retry: RetryPolicy,
}

impl CorrectionEngine {
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
        }
    }

    pub async fn resubmit(
        &self,
        id: SubmissionId,
        row: u32,
        correction: RecordCorrection,
    ) -> Result<RecordResult, SubmissionError> {
        self.resubmit_on(id, row, correction, validation::today()).await
    }

    /// Validate the corrected record with the pre-submission rules, send it
    /// as a new submission and replace the row's result. `resubmit_count`
    /// goes up by one only when the registry answered.
    pub async fn resubmit_on(
        &self,
        id: SubmissionId,
        row: u32,
        correction: RecordCorrection,
        today: NaiveDate,
    ) -> Result<RecordResult, SubmissionError> {
        let entry = self.store.get(id).await?;
        let (ticket, provider) = {
            let mut s = entry.write().await;
            let ticket = s.reserve_for_correction(row)?;
            (ticket, s.provider.clone())
        };

        let corrected = correction.apply(ticket.record);
        if let Err(e) = self.check(&corrected, today) {
            entry.write().await.release(row);
            return Err(e);
        }

        let request = EncounterRequest::submission(&provider, &[&corrected]);
        let attempted = with_backoff(&self.retry, |_| self.registry.record_encounter(&request)).await;
        let response = match attempted.result {
            Ok(response) => response,
            Err(e) => {
                entry.write().await.release(row);
                tracing::warn!(submission_id = %id, row, error = %e, "Correction not delivered");
                return Err(e.into());
            }
        };

        let mut result = self
            .classifier
            .classify(row, RegistryOutcome::for_encounter(&response, 1));
        result.resubmit_count = ticket.resubmit_count + 1;
        result.attempt = AttemptKind::Correction;
        result.delivery_uncertain = attempted.delivery_uncertain;

        entry.write().await.supersede(result.clone(), Some(corrected))?;
        tracing::info!(
            submission_id = %id,
            row,
            resubmit_count = result.resubmit_count,
            status = %result.status,
            "Corrected row resubmitted"
        );
        Ok(result)
    }

    /// Same order as `start`: size limits first, then field rules.
    fn check(&self, record: &EncounterRecord, today: NaiveDate) -> Result<(), SubmissionError> {
        check_record(record, &self.limits)?;
        let violations = validation::validate_record(record, today);
        if !violations.is_empty() {
            return Err(ValidationError {
                rows: vec![RowViolations {
                    row_number: record.row_number,
                    violations,
                }],
            }
            .into());
        }
        Ok(())
    }
}
