//! Partition validated records into registry-sized batches.
//!
//! Rows are never reordered or dropped. A new batch starts when the
//! individual changes (one registry call carries one individual), when the
//! episode ceiling would be crossed, or when the row ceiling would be crossed,
//! checked in that order.

use serde::{Deserialize, Serialize};

use super::error::{GroupingError, RowOverflow};
use super::types::Batch;
use crate::models::EncounterRecord;

/// Per-request ceilings imposed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingLimits {
    pub max_encounters_per_request: usize,
    pub max_episodes_per_request: usize,
}

/// Reject a record that could never fit in a single registry call.
pub fn check_record(record: &EncounterRecord, limits: &GroupingLimits) -> Result<(), GroupingError> {
    let episode_count = record.episode_count();
    if episode_count > limits.max_episodes_per_request {
        return Err(GroupingError::EpisodeCeilingExceeded {
            ceiling: limits.max_episodes_per_request,
            rows: vec![RowOverflow {
                row_number: record.row_number,
                episode_count,
            }],
        });
    }
    Ok(())
}

/// Split `records` into ordered batches.
///
/// Every oversized record is reported at once, before any batch is built.
pub fn group(records: &[EncounterRecord], limits: &GroupingLimits) -> Result<Vec<Batch>, GroupingError> {
    let overflow: Vec<RowOverflow> = records
        .iter()
        .filter(|r| r.episode_count() > limits.max_episodes_per_request)
        .map(|r| RowOverflow {
            row_number: r.row_number,
            episode_count: r.episode_count(),
        })
        .collect();
    if !overflow.is_empty() {
        return Err(GroupingError::EpisodeCeilingExceeded {
            ceiling: limits.max_episodes_per_request,
            rows: overflow,
        });
    }

    let max_rows = limits.max_encounters_per_request.max(1);
    let mut batches = Vec::new();
    let mut rows: Vec<u32> = Vec::new();
    let mut episodes = 0usize;
    let mut subject: Option<String> = None;

    for record in records {
        let key = record.individual.subject_key();
        let count = record.episode_count();

        let new_subject = subject.as_deref().is_some_and(|s| s != key);
        let episodes_full = episodes + count > limits.max_episodes_per_request;
        let rows_full = rows.len() >= max_rows;

        if !rows.is_empty() && (new_subject || episodes_full || rows_full) {
            batches.push(Batch::new(batches.len(), std::mem::take(&mut rows), episodes));
            episodes = 0;
        }

        rows.push(record.row_number);
        episodes += count;
        subject = Some(key);
    }

    if !rows.is_empty() {
        batches.push(Batch::new(batches.len(), rows, episodes));
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, Encounter, Episode, IndividualIdentifier};
    use chrono::NaiveDate;

    fn limits(rows: usize, episodes: usize) -> GroupingLimits {
        GroupingLimits {
            max_encounters_per_request: rows,
            max_episodes_per_request: episodes,
        }
    }

    fn record(row: u32, person: &str, episodes: usize) -> EncounterRecord {
        EncounterRecord {
            row_number: row,
            individual: IndividualIdentifier {
                last_name: Some(person.into()),
                date_of_birth: NaiveDate::from_ymd_opt(1985, 1, 1),
                gender: Some("M".into()),
                ihi_number: Some("8003608166690503".into()),
                ..Default::default()
            },
            encounter: Encounter {
                date_of_service: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
                episodes: (0..episodes)
                    .map(|i| Episode {
                        vaccine_code: format!("VAC{i}"),
                        vaccine_dose: "1".into(),
                        vaccine_batch: None,
                        vaccine_type: None,
                        route_of_administration: None,
                    })
                    .collect(),
                immunising_provider: None,
            },
        }
    }

    fn flatten(batches: &[Batch]) -> Vec<u32> {
        batches.iter().flat_map(|b| b.rows.iter().copied()).collect()
    }

    #[test]
    fn preserves_order_and_total() {
        let records: Vec<_> = (1..=23)
            .map(|i| record(i, if i % 7 == 0 { "Other" } else { "Same" }, (i as usize % 3) + 1))
            .collect();
        let batches = group(&records, &limits(4, 6)).unwrap();

        assert_eq!(flatten(&batches), (1..=23).collect::<Vec<_>>());
        assert_eq!(batches.iter().map(Batch::record_count).sum::<usize>(), 23);
        for (i, b) in batches.iter().enumerate() {
            assert_eq!(b.index, i);
            assert!(b.record_count() <= 4);
            assert!(b.episode_count <= 6);
            assert_eq!(b.status, BatchStatus::Draft);
        }
    }

    #[test]
    fn splits_by_episode_count_before_row_count() {
        let records = vec![record(1, "A", 3), record(2, "A", 3), record(3, "A", 1)];
        let batches = group(&records, &limits(10, 5)).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].rows, vec![1]);
        assert_eq!(batches[1].rows, vec![2, 3]);
        assert_eq!(batches[1].episode_count, 4);
    }

    #[test]
    fn splits_by_row_count() {
        let records: Vec<_> = (1..=5).map(|i| record(i, "A", 1)).collect();
        let batches = group(&records, &limits(2, 50)).unwrap();
        let sizes: Vec<_> = batches.iter().map(Batch::record_count).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn new_individual_starts_new_batch() {
        let records = vec![record(1, "A", 1), record(2, "B", 1), record(3, "B", 1), record(4, "A", 1)];
        let batches = group(&records, &limits(10, 10)).unwrap();
        let rows: Vec<_> = batches.iter().map(|b| b.rows.clone()).collect();
        assert_eq!(rows, vec![vec![1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn record_at_exact_ceiling_fits() {
        let batches = group(&[record(1, "A", 5)], &limits(10, 5)).unwrap();
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn oversized_records_are_all_reported() {
        let records = vec![record(1, "A", 2), record(2, "A", 6), record(3, "B", 1), record(4, "B", 9)];
        let err = group(&records, &limits(10, 5)).unwrap_err();
        let GroupingError::EpisodeCeilingExceeded { ceiling, rows } = err;
        assert_eq!(ceiling, 5);
        assert_eq!(
            rows.iter().map(|r| r.row_number).collect::<Vec<_>>(),
            vec![2, 4]
        );
    }

    #[test]
    fn empty_input_gives_no_batches() {
        assert!(group(&[], &limits(10, 5)).unwrap().is_empty());
    }

    #[test]
    fn check_record_matches_group() {
        assert!(check_record(&record(1, "A", 5), &limits(1, 5)).is_ok());
        assert!(check_record(&record(1, "A", 6), &limits(1, 5)).is_err());
    }
}
