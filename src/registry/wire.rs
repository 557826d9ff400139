//! Request and response bodies of the registry's record-encounter call.
//!
//! Dates travel as `ddMMyyyy`. Encounter and episode ids are positions
//! (1-based) inside one request and are how per-row results are matched back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Encounter, EncounterRecord, IndividualIdentifier, InformationProvider};

pub const WIRE_DATE_FORMAT: &str = "%d%m%Y";

pub fn wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

// ═══════════════════════════════════════════
// Request
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRequest {
    pub individual: WireIndividual,
    pub encounters: Vec<WireEncounter>,
    pub information_provider: WireProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIndividual {
    pub personal_details: WirePersonalDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicare_card: Option<WireMedicareCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ihi_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<WireAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePersonalDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMedicareCard {
    pub medicare_card_number: String,
    #[serde(rename = "medicareIRN")]
    pub medicare_irn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAddress {
    pub post_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEncounter {
    pub id: u32,
    pub date_of_service: String,
    pub episodes: Vec<WireEpisode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immunisation_provider: Option<WireProviderRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_and_confirm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEpisode {
    pub id: u32,
    pub vaccine_code: String,
    pub vaccine_dose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccine_batch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_of_administration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProviderRef {
    pub provider_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProvider {
    pub provider_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpio_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpii_number: Option<String>,
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl From<&IndividualIdentifier> for WireIndividual {
    fn from(ind: &IndividualIdentifier) -> Self {
        let medicare_card = match (trimmed(&ind.medicare_card_number), trimmed(&ind.medicare_irn)) {
            (Some(number), Some(irn)) => Some(WireMedicareCard {
                medicare_card_number: number,
                medicare_irn: irn,
            }),
            _ => None,
        };
        Self {
            personal_details: WirePersonalDetails {
                first_name: trimmed(&ind.first_name),
                last_name: trimmed(&ind.last_name),
                date_of_birth: ind.date_of_birth.map(wire_date),
                gender: trimmed(&ind.gender),
            },
            medicare_card,
            ihi_number: trimmed(&ind.ihi_number),
            address: trimmed(&ind.postcode).map(|post_code| WireAddress { post_code }),
        }
    }
}

impl From<&InformationProvider> for WireProvider {
    fn from(p: &InformationProvider) -> Self {
        Self {
            provider_number: p.provider_number.trim().to_string(),
            hpio_number: trimmed(&p.hpio_number),
            hpii_number: trimmed(&p.hpii_number),
        }
    }
}

impl WireEncounter {
    fn from_encounter(id: u32, encounter: &Encounter) -> Self {
        Self {
            id,
            date_of_service: wire_date(encounter.date_of_service),
            episodes: encounter
                .episodes
                .iter()
                .enumerate()
                .map(|(i, e)| WireEpisode {
                    id: i as u32 + 1,
                    vaccine_code: e.vaccine_code.trim().to_string(),
                    vaccine_dose: e.vaccine_dose.trim().to_string(),
                    vaccine_batch: trimmed(&e.vaccine_batch),
                    vaccine_type: trimmed(&e.vaccine_type),
                    route_of_administration: trimmed(&e.route_of_administration),
                })
                .collect(),
            immunisation_provider: trimmed(&encounter.immunising_provider)
                .map(|provider_number| WireProviderRef { provider_number }),
            claim_sequence_number: None,
            accept_and_confirm: None,
        }
    }
}

impl EncounterRequest {
    /// Fresh submission of one individual's encounters, in row order.
    /// Encounter ids are the 1-based positions of `records`.
    pub fn submission(provider: &InformationProvider, records: &[&EncounterRecord]) -> Self {
        let individual = records
            .first()
            .map(|r| WireIndividual::from(&r.individual))
            .unwrap_or_else(|| WireIndividual::from(&IndividualIdentifier::default()));
        Self {
            individual,
            encounters: records
                .iter()
                .enumerate()
                .map(|(i, r)| WireEncounter::from_encounter(i as u32 + 1, &r.encounter))
                .collect(),
            information_provider: provider.into(),
            claim_id: None,
        }
    }

    /// Accept-and-confirm request for a pended record.
    pub fn confirmation(
        provider: &InformationProvider,
        record: &EncounterRecord,
        claim_id: Option<&str>,
        claim_sequence_number: Option<&str>,
    ) -> Self {
        let mut encounter = WireEncounter::from_encounter(1, &record.encounter);
        encounter.claim_sequence_number = claim_sequence_number.map(str::to_string);
        encounter.accept_and_confirm = Some("Y".to_string());
        Self {
            individual: WireIndividual::from(&record.individual),
            encounters: vec![encounter],
            information_provider: provider.into(),
            claim_id: claim_id.map(str::to_string),
        }
    }

    /// DOB of the individual in wire format (used as the subject header).
    pub fn subject_id(&self) -> Option<&str> {
        self.individual.personal_details.date_of_birth.as_deref()
    }

    pub fn is_confirmation(&self) -> bool {
        self.encounters
            .iter()
            .any(|e| e.accept_and_confirm.as_deref() == Some("Y"))
    }
}

// ═══════════════════════════════════════════
// Response
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryResponse {
    pub status_code: String,
    pub message: String,
    #[serde(default)]
    pub claim_details: Option<ClaimDetails>,
    #[serde(default)]
    pub encounters: Vec<EncounterResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDetails {
    pub claim_id: String,
    #[serde(default)]
    pub claim_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterResult {
    pub id: u32,
    #[serde(default, alias = "claimSeqNum")]
    pub claim_sequence_number: Option<String>,
    #[serde(default)]
    pub information: Option<Information>,
    #[serde(default)]
    pub episodes: Vec<EpisodeResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeResult {
    pub id: u32,
    #[serde(default)]
    pub information: Option<Information>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Information {
    #[serde(default)]
    pub status: Option<String>,
    pub code: String,
    pub text: String,
}

impl RegistryResponse {
    pub fn claim_id(&self) -> Option<&str> {
        self.claim_details.as_ref().map(|c| c.claim_id.as_str())
    }

    pub fn encounter(&self, id: u32) -> Option<&EncounterResult> {
        self.encounters.iter().find(|e| e.id == id)
    }
}
