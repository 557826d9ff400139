//! Supplementary guidance shown next to (never instead of) registry messages.

const GUIDANCE: &[(&str, &str)] = &[
    (
        "AIR-I-1007",
        "All encounters were recorded. No further action is needed.",
    ),
    (
        "AIR-I-1000",
        "The encounter was recorded.",
    ),
    (
        "AIR-W-1004",
        "The individual could not be matched. Check the identifying details and correct them, or confirm the details are right to record the encounter.",
    ),
    (
        "AIR-W-1008",
        "Some encounters in the request were not recorded. Review each row's own result.",
    ),
    (
        "AIR-W-0044",
        "The episode was pended. Confirm to accept it or correct the row and resubmit.",
    ),
    (
        "AIR-E-1005",
        "The request failed registry validation. Correct the listed fields and resubmit the row.",
    ),
    (
        "AIR-E-1026",
        "Not enough identifying information. Supply a Medicare card with IRN, an IHI, or full name, date of birth, gender and postcode.",
    ),
    (
        "AIR-E-1046",
        "The individual is not known to the registry. Confirm to create the individual, or correct the details.",
    ),
];

/// Guidance text for a status code, if any.
pub fn for_code(code: &str) -> Option<&'static str> {
    let code = code.trim();
    GUIDANCE
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, text)| *text)
}

/// Guidance for rows that never reached the registry.
pub const NOT_ATTEMPTED: &str =
    "The registry was not reached for this row. It can be corrected and resubmitted.";
