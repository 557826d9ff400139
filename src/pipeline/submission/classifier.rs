//! Maps one registry outcome onto a Record Result.

use std::collections::HashSet;

use super::types::RecordResult;
use crate::models::{ActionRequired, AttemptKind, RecordStatus};
use crate::registry::RegistryOutcome;

/// Pure classification rules. The only configuration is which error codes
/// the registry lets a submitter confirm instead of correct.
#[derive(Debug, Clone, Default)]
pub struct RecordClassifier {
    confirmable_error_codes: HashSet<String>,
}

impl RecordClassifier {
    pub fn new<I, S>(confirmable_error_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            confirmable_error_codes: confirmable_error_codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn is_confirmable_error(&self, code: &str) -> bool {
        self.confirmable_error_codes
            .contains(&code.trim().to_ascii_uppercase())
    }

    /// Classify the registry's answer for one row.
    ///
    /// - informational → SUCCESS
    /// - warning → WARNING, pending only when a claim id came back
    /// - error → ERROR, pending only for confirmable codes
    /// - unrecognized → ERROR, no follow-up offered
    ///
    /// The message is moved through untouched. `resubmit_count` starts at 0;
    /// engines that supersede a result set it themselves.
    pub fn classify(&self, row_number: u32, outcome: RegistryOutcome) -> RecordResult {
        let (status, action_required) = match &outcome {
            RegistryOutcome::Informational(_) => (RecordStatus::Success, ActionRequired::None),
            RegistryOutcome::Warning(reply) => {
                let pended = reply.claim_id.as_deref().is_some_and(|c| !c.trim().is_empty());
                let action = if pended {
                    ActionRequired::ConfirmOrCorrect
                } else {
                    ActionRequired::None
                };
                (RecordStatus::Warning, action)
            }
            RegistryOutcome::Error(reply) => {
                let action = if self.is_confirmable_error(&reply.code) {
                    ActionRequired::ConfirmOrCorrect
                } else {
                    ActionRequired::None
                };
                (RecordStatus::Error, action)
            }
            RegistryOutcome::Unrecognized(reply) => {
                tracing::warn!(row = row_number, code = %reply.code, "Unrecognized registry status code");
                (RecordStatus::Error, ActionRequired::None)
            }
        };

        let reply = outcome.into_reply();
        RecordResult {
            row_number,
            status,
            action_required,
            status_code: Some(reply.code),
            message: Some(reply.message),
            claim_id: reply.claim_id,
            claim_sequence_number: reply.claim_sequence_number,
            episodes: reply.episodes,
            resubmit_count: 0,
            attempt: AttemptKind::Initial,
            failure_reason: None,
            delivery_uncertain: false,
        }
    }
}
