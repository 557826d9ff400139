use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifying details for the person who received the vaccine.
///
/// Every field is optional on input; which ones must be present depends on
/// the identification scenario the record satisfies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualIdentifier {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub medicare_card_number: Option<String>,
    #[serde(default)]
    pub medicare_irn: Option<String>,
    #[serde(default)]
    pub ihi_number: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// The three minimum-identification combinations the registry accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationScenario {
    /// Medicare card number + IRN + last name, DOB, gender.
    MedicareCard,
    /// Individual Healthcare Identifier + last name, DOB, gender.
    HealthIdentifier,
    /// First and last name, DOB, gender, postcode.
    Demographic,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl IndividualIdentifier {
    fn has_core_demographics(&self) -> bool {
        present(&self.last_name) && self.date_of_birth.is_some() && present(&self.gender)
    }

    /// Resolve the identification scenario, checked in precedence order
    /// Medicare card, IHI, demographic. `None` means the individual cannot
    /// be identified by the registry.
    pub fn scenario(&self) -> Option<IdentificationScenario> {
        if !self.has_core_demographics() {
            return None;
        }
        if present(&self.medicare_card_number) && present(&self.medicare_irn) {
            Some(IdentificationScenario::MedicareCard)
        } else if present(&self.ihi_number) {
            Some(IdentificationScenario::HealthIdentifier)
        } else if present(&self.first_name) && present(&self.postcode) {
            Some(IdentificationScenario::Demographic)
        } else {
            None
        }
    }

    /// Normalised identity used to keep one individual per registry request.
    pub fn subject_key(&self) -> String {
        fn norm(v: &Option<String>) -> String {
            v.as_deref().unwrap_or("").trim().to_ascii_uppercase()
        }
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            norm(&self.medicare_card_number),
            norm(&self.medicare_irn),
            norm(&self.ihi_number),
            norm(&self.first_name),
            norm(&self.last_name),
            self.date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
            norm(&self.gender),
            norm(&self.postcode),
        )
    }
}
