//! Pre-dispatch validation shared by `start` and the correction engine.
//!
//! A corrected record goes through exactly the same checks as a first
//! submission, so nothing reaches the registry that would have been rejected
//! the first time.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::error::{FieldViolation, RowViolations, ValidationError};
use crate::models::{EncounterRecord, IndividualIdentifier, InformationProvider};

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z' \-]{0,39}$").expect("static pattern"));
static PROVIDER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}[0-9A-Z][A-Z]$").expect("static pattern"));
static VACCINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,6}$").expect("static pattern"));
static VACCINE_DOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(B|[1-9]|1[0-9]|20)$").expect("static pattern"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("static pattern"));

const GENDERS: &[&str] = &["M", "F", "X"];
const VACCINE_TYPES: &[&str] = &["NIP", "AEN", "OTH"];
const ROUTES: &[&str] = &["IM", "SC", "ID", "PO", "NS"];
const IHI_PREFIX: &str = "800360";
const MAX_BATCH_LEN: usize = 15;

/// Today in the submitter's local time zone.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn digits(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Medicare card: 10 digits, first 2-6, 9th digit is the weighted checksum
/// of the first eight.
pub fn medicare_number_valid(number: &str) -> bool {
    if number.len() != 10 || !DIGITS.is_match(number) {
        return false;
    }
    let d = digits(number);
    if !(2..=6).contains(&d[0]) {
        return false;
    }
    const WEIGHTS: [u32; 8] = [1, 3, 7, 9, 1, 3, 7, 9];
    let sum: u32 = d.iter().zip(WEIGHTS).map(|(x, w)| x * w).sum();
    sum % 10 == d[8]
}

/// IHI: 16 digits, national prefix, Luhn check digit.
pub fn ihi_valid(number: &str) -> bool {
    if number.len() != 16 || !DIGITS.is_match(number) || !number.starts_with(IHI_PREFIX) {
        return false;
    }
    let sum: u32 = digits(number)
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn check_individual(ind: &IndividualIdentifier, today: NaiveDate, out: &mut Vec<FieldViolation>) {
    if ind.scenario().is_none() {
        out.push(FieldViolation::new(
            "individual",
            "Supply Medicare card number and IRN, or IHI, or first name and postcode, together with last name, date of birth and gender",
        ));
    }
    for (field, value) in [("firstName", &ind.first_name), ("lastName", &ind.last_name)] {
        if let Some(name) = non_blank(value) {
            if !NAME.is_match(name) {
                out.push(FieldViolation::new(field, "Must be 1-40 letters, spaces, apostrophes or hyphens"));
            }
        }
    }
    if let Some(dob) = ind.date_of_birth {
        if dob > today {
            out.push(FieldViolation::new("dateOfBirth", "Cannot be in the future"));
        }
    }
    if let Some(gender) = non_blank(&ind.gender) {
        if !GENDERS.contains(&gender) {
            out.push(FieldViolation::new("gender", "Must be M, F or X"));
        }
    }
    if let Some(number) = non_blank(&ind.medicare_card_number) {
        if !medicare_number_valid(number) {
            out.push(FieldViolation::new("medicareCardNumber", "Not a valid 10 digit Medicare card number"));
        }
    }
    if let Some(irn) = non_blank(&ind.medicare_irn) {
        if !matches!(irn, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9") {
            out.push(FieldViolation::new("medicareIrn", "Must be a single digit 1-9"));
        }
    }
    if let Some(ihi) = non_blank(&ind.ihi_number) {
        if !ihi_valid(ihi) {
            out.push(FieldViolation::new("ihiNumber", "Not a valid 16 digit IHI"));
        }
    }
    if let Some(postcode) = non_blank(&ind.postcode) {
        if postcode.len() != 4 || !DIGITS.is_match(postcode) {
            out.push(FieldViolation::new("postcode", "Must be 4 digits"));
        }
    }
}

/// Field-level problems of one record. Empty means valid.
pub fn validate_record(record: &EncounterRecord, today: NaiveDate) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    if record.row_number == 0 {
        out.push(FieldViolation::new("rowNumber", "Row numbers start at 1"));
    }
    check_individual(&record.individual, today, &mut out);

    let encounter = &record.encounter;
    if encounter.date_of_service > today {
        out.push(FieldViolation::new("dateOfService", "Cannot be in the future"));
    }
    if let Some(dob) = record.individual.date_of_birth {
        if encounter.date_of_service < dob {
            out.push(FieldViolation::new("dateOfService", "Cannot be before the date of birth"));
        }
    }
    if let Some(provider) = non_blank(&encounter.immunising_provider) {
        if !PROVIDER_NUMBER.is_match(provider) {
            out.push(FieldViolation::new("immunisingProvider", "Not a valid provider number"));
        }
    }
    if encounter.episodes.is_empty() {
        out.push(FieldViolation::new("episodes", "At least one episode is required"));
    }
    for (i, episode) in encounter.episodes.iter().enumerate() {
        let n = i + 1;
        if !VACCINE_CODE.is_match(episode.vaccine_code.trim()) {
            out.push(FieldViolation::new(
                &format!("episodes[{n}].vaccineCode"),
                "Must be 1-6 letters or digits",
            ));
        }
        if !VACCINE_DOSE.is_match(episode.vaccine_dose.trim()) {
            out.push(FieldViolation::new(
                &format!("episodes[{n}].vaccineDose"),
                "Must be 1-20 or B",
            ));
        }
        if let Some(batch) = &episode.vaccine_batch {
            let batch = batch.trim();
            if batch.is_empty() || batch.chars().count() > MAX_BATCH_LEN {
                out.push(FieldViolation::new(
                    &format!("episodes[{n}].vaccineBatch"),
                    "Must be 1-15 characters",
                ));
            }
        }
        if let Some(kind) = non_blank(&episode.vaccine_type) {
            if !VACCINE_TYPES.contains(&kind) {
                out.push(FieldViolation::new(
                    &format!("episodes[{n}].vaccineType"),
                    "Must be NIP, AEN or OTH",
                ));
            }
        }
        if let Some(route) = non_blank(&episode.route_of_administration) {
            if !ROUTES.contains(&route) {
                out.push(FieldViolation::new(
                    &format!("episodes[{n}].routeOfAdministration"),
                    "Must be IM, SC, ID, PO or NS",
                ));
            }
        }
    }
    out
}

/// Validate a whole record set, collecting problems per row.
pub fn validate_records(records: &[EncounterRecord], today: NaiveDate) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for record in records {
        let mut violations = validate_record(record, today);
        if !seen.insert(record.row_number) {
            violations.push(FieldViolation::new("rowNumber", "Duplicate row number"));
        }
        if !violations.is_empty() {
            rows.push(RowViolations {
                row_number: record.row_number,
                violations,
            });
        }
    }
    if rows.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { rows })
    }
}

pub fn validate_provider(provider: &InformationProvider) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    if !PROVIDER_NUMBER.is_match(provider.provider_number.trim()) {
        out.push(FieldViolation::new("providerNumber", "Not a valid provider number"));
    }
    for (field, value) in [("hpioNumber", &provider.hpio_number), ("hpiiNumber", &provider.hpii_number)] {
        if let Some(v) = non_blank(value) {
            if v.len() != 16 || !DIGITS.is_match(v) {
                out.push(FieldViolation::new(field, "Must be 16 digits"));
            }
        }
    }
    out
}
