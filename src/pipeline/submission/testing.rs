//! Shared fixtures for submission pipeline tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use super::progress::SubmissionProgress;
use super::service::SubmissionPipeline;
use super::types::SubmissionId;
use super::{GroupingLimits, RetryPolicy};
use crate::config::PipelineSettings;
use crate::models::{Encounter, EncounterRecord, Episode, IndividualIdentifier, InformationProvider};
use crate::registry::wire::{ClaimDetails, EncounterResult, Information};
use crate::registry::{EncounterRequest, MockRegistryClient, RegistryResponse};

pub(crate) fn provider() -> InformationProvider {
    InformationProvider {
        provider_number: "2448141T".into(),
        hpio_number: None,
        hpii_number: None,
    }
}

pub(crate) fn record_for(row: u32, last_name: &str, episodes: usize) -> EncounterRecord {
    EncounterRecord {
        row_number: row,
        individual: IndividualIdentifier {
            first_name: Some("Jane".into()),
            last_name: Some(last_name.into()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12),
            gender: Some("F".into()),
            ihi_number: Some("8003608166690503".into()),
            ..Default::default()
        },
        encounter: Encounter {
            date_of_service: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            episodes: (0..episodes)
                .map(|i| Episode {
                    vaccine_code: "COMIRN".into(),
                    vaccine_dose: (i + 1).to_string(),
                    vaccine_batch: Some("FL1234".into()),
                    vaccine_type: None,
                    route_of_administration: Some("IM".into()),
                })
                .collect(),
            immunising_provider: None,
        },
    }
}

pub(crate) fn record(row: u32) -> EncounterRecord {
    record_for(row, "Citizen", 1)
}

/// Letters-only surname unique per row, so every row is its own individual.
pub(crate) fn own_individual(row: u32) -> EncounterRecord {
    let suffix: String = row
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| (b'a' + d as u8) as char)
        .collect();
    record_for(row, &format!("Citizen{suffix}"), 1)
}

/// Millisecond backoff so retry scenarios stay fast.
pub(crate) fn settings(max_rows: usize) -> PipelineSettings {
    PipelineSettings {
        limits: GroupingLimits {
            max_encounters_per_request: max_rows,
            max_episodes_per_request: 20,
        },
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        dispatch_concurrency: 1,
        confirmable_error_codes: vec!["AIR-E-1046".into()],
    }
}

pub(crate) fn pipeline(mock: Arc<MockRegistryClient>, settings: &PipelineSettings) -> SubmissionPipeline {
    SubmissionPipeline::new(mock, settings)
}

fn info(code: &str, text: &str) -> Option<Information> {
    Some(Information {
        status: None,
        code: code.into(),
        text: text.into(),
    })
}

/// Same answer for every encounter of the request.
pub(crate) fn uniform(
    request: &EncounterRequest,
    code: &str,
    message: &str,
    claim_id: Option<&str>,
) -> RegistryResponse {
    RegistryResponse {
        status_code: code.into(),
        message: message.into(),
        claim_details: claim_id.map(|c| ClaimDetails {
            claim_id: c.into(),
            claim_date: None,
        }),
        encounters: request
            .encounters
            .iter()
            .map(|e| EncounterResult {
                id: e.id,
                claim_sequence_number: claim_id.map(|_| e.id.to_string()),
                information: info(code, message),
                episodes: Vec::new(),
            })
            .collect(),
    }
}

/// Poll progress until `done` holds; panics after two seconds.
pub(crate) async fn wait_for<F>(pipeline: &SubmissionPipeline, id: SubmissionId, done: F) -> SubmissionProgress
where
    F: Fn(&SubmissionProgress) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let progress = pipeline.progress.get_progress(id).await.unwrap();
        if done(&progress) {
            return progress;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last progress: {progress:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub(crate) async fn wait_until_finished(pipeline: &SubmissionPipeline, id: SubmissionId) -> SubmissionProgress {
    wait_for(pipeline, id, |p| p.status.is_terminal()).await
}
