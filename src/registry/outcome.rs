//! Typed view of one row's registry outcome.
//!
//! Registry payloads are loosely shaped: the overall status sits at the top,
//! per-encounter information may or may not be present. Everything is folded
//! into `RegistryOutcome` here so callers never poke at raw fields.

use serde::{Deserialize, Serialize};

use super::wire::RegistryResponse;

/// Class of a registry status code (`AIR-I-…`, `AIR-W-…`, `AIR-E-…`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeClass {
    Informational,
    Warning,
    Error,
    Unrecognized,
}

impl CodeClass {
    /// The class letter is the second dash-separated segment of the code.
    pub fn of(code: &str) -> Self {
        let mut parts = code.trim().split('-');
        let _system = parts.next();
        match parts.next().map(|p| p.to_ascii_uppercase()) {
            Some(letter) if letter == "I" => Self::Informational,
            Some(letter) if letter == "W" => Self::Warning,
            Some(letter) if letter == "E" => Self::Error,
            _ => Self::Unrecognized,
        }
    }
}

/// Per-episode line of the registry's breakdown, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeOutcome {
    pub episode_id: u32,
    pub code: String,
    pub message: String,
}

/// Everything the registry said about one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryReply {
    pub code: String,
    pub message: String,
    pub claim_id: Option<String>,
    pub claim_sequence_number: Option<String>,
    pub episodes: Vec<EpisodeOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOutcome {
    Informational(RegistryReply),
    Warning(RegistryReply),
    Error(RegistryReply),
    /// Code outside the three known classes; never guessed at.
    Unrecognized(RegistryReply),
}

impl RegistryOutcome {
    pub fn from_reply(reply: RegistryReply) -> Self {
        match CodeClass::of(&reply.code) {
            CodeClass::Informational => Self::Informational(reply),
            CodeClass::Warning => Self::Warning(reply),
            CodeClass::Error => Self::Error(reply),
            CodeClass::Unrecognized => Self::Unrecognized(reply),
        }
    }

    /// Outcome for the encounter at 1-based position `encounter_id` of the
    /// request. Falls back to the top-level status when the registry did
    /// not break the result down per encounter.
    pub fn for_encounter(response: &RegistryResponse, encounter_id: u32) -> Self {
        let encounter = response.encounter(encounter_id);
        let (code, message) = match encounter.and_then(|e| e.information.as_ref()) {
            Some(info) => (info.code.clone(), info.text.clone()),
            None => (response.status_code.clone(), response.message.clone()),
        };
        let episodes = encounter
            .map(|e| {
                e.episodes
                    .iter()
                    .filter_map(|ep| {
                        ep.information.as_ref().map(|info| EpisodeOutcome {
                            episode_id: ep.id,
                            code: info.code.clone(),
                            message: info.text.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self::from_reply(RegistryReply {
            code,
            message,
            claim_id: response.claim_id().map(str::to_string),
            claim_sequence_number: encounter.and_then(|e| e.claim_sequence_number.clone()),
            episodes,
        })
    }

    pub fn reply(&self) -> &RegistryReply {
        match self {
            Self::Informational(r) | Self::Warning(r) | Self::Error(r) | Self::Unrecognized(r) => r,
        }
    }

    pub fn into_reply(self) -> RegistryReply {
        match self {
            Self::Informational(r) | Self::Warning(r) | Self::Error(r) | Self::Unrecognized(r) => r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> RegistryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn code_classes() {
        assert_eq!(CodeClass::of("AIR-I-1007"), CodeClass::Informational);
        assert_eq!(CodeClass::of("AIR-W-1004"), CodeClass::Warning);
        assert_eq!(CodeClass::of("air-e-1026"), CodeClass::Error);
        assert_eq!(CodeClass::of("AIR-X-1"), CodeClass::Unrecognized);
        assert_eq!(CodeClass::of("garbage"), CodeClass::Unrecognized);
        assert_eq!(CodeClass::of(""), CodeClass::Unrecognized);
    }

    #[test]
    fn encounter_information_wins_over_top_level() {
        let resp = response(
            r#"{"statusCode":"AIR-W-1008","message":"Not all encounters processed",
                "claimDetails":{"claimId":"C1"},
                "encounters":[
                  {"id":1,"information":{"code":"AIR-I-1000","text":"Encounter was recorded."}},
                  {"id":2,"claimSeqNum":"2","information":{"code":"AIR-W-0044","text":"Pended, confirm"}}
                ]}"#,
        );
        let first = RegistryOutcome::for_encounter(&resp, 1);
        assert!(matches!(first, RegistryOutcome::Informational(_)));
        assert_eq!(first.reply().message, "Encounter was recorded.");

        let second = RegistryOutcome::for_encounter(&resp, 2);
        assert!(matches!(second, RegistryOutcome::Warning(_)));
        assert_eq!(second.reply().claim_id.as_deref(), Some("C1"));
        assert_eq!(second.reply().claim_sequence_number.as_deref(), Some("2"));
    }

    #[test]
    fn missing_breakdown_uses_top_level_status() {
        let resp = response(r#"{"statusCode":"AIR-E-1005","message":"Validation errors  found. "}"#);
        let outcome = RegistryOutcome::for_encounter(&resp, 3);
        assert!(matches!(outcome, RegistryOutcome::Error(_)));
        assert_eq!(outcome.reply().message, "Validation errors  found. ");
        assert!(outcome.reply().claim_sequence_number.is_none());
    }

    #[test]
    fn unknown_code_is_unrecognized_not_dropped() {
        let resp = response(r#"{"statusCode":"DHS-500","message":"gateway says no"}"#);
        let outcome = RegistryOutcome::for_encounter(&resp, 1);
        assert!(matches!(outcome, RegistryOutcome::Unrecognized(_)));
        assert_eq!(outcome.into_reply().code, "DHS-500");
    }

    #[test]
    fn episode_breakdown_is_kept() {
        let resp = response(
            r#"{"statusCode":"AIR-E-1005","message":"m",
                "encounters":[{"id":1,"information":{"code":"AIR-E-1005","text":"bad"},
                  "episodes":[{"id":1,"information":{"code":"AIR-E-1023","text":"Invalid vaccine code"}},{"id":2}]}]}"#,
        );
        let outcome = RegistryOutcome::for_encounter(&resp, 1);
        assert_eq!(
            outcome.reply().episodes,
            vec![EpisodeOutcome {
                episode_id: 1,
                code: "AIR-E-1023".into(),
                message: "Invalid vaccine code".into(),
            }]
        );
    }
}
