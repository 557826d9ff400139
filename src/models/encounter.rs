use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::individual::IndividualIdentifier;

/// One vaccine administered during an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub vaccine_code: String,
    pub vaccine_dose: String,
    #[serde(default)]
    pub vaccine_batch: Option<String>,
    #[serde(default)]
    pub vaccine_type: Option<String>,
    #[serde(default)]
    pub route_of_administration: Option<String>,
}

/// One vaccination event for one individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub date_of_service: NaiveDate,
    pub episodes: Vec<Episode>,
    /// Provider number of the immunising provider, when different from the
    /// information provider.
    #[serde(default)]
    pub immunising_provider: Option<String>,
}

/// An input row: one encounter plus the individual it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRecord {
    pub row_number: u32,
    pub individual: IndividualIdentifier,
    pub encounter: Encounter,
}

impl EncounterRecord {
    pub fn episode_count(&self) -> usize {
        self.encounter.episodes.len()
    }
}

/// The organisation reporting the encounters (attached to every request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationProvider {
    pub provider_number: String,
    #[serde(default)]
    pub hpio_number: Option<String>,
    #[serde(default)]
    pub hpii_number: Option<String>,
}
