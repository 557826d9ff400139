//! Content fingerprint of a submission request, used to dedupe `start`.

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::SubmissionError;
use crate::models::{EncounterRecord, InformationProvider};

#[derive(Serialize)]
struct Canonical<'a> {
    provider: &'a InformationProvider,
    records: &'a [EncounterRecord],
}

/// SHA-256 over the canonical JSON of provider + records, base64-encoded.
///
/// Struct fields serialise in declaration order, so equal payloads always
/// produce equal bytes.
pub fn fingerprint(
    provider: &InformationProvider,
    records: &[EncounterRecord],
) -> Result<String, SubmissionError> {
    let bytes = serde_json::to_vec(&Canonical { provider, records })
        .map_err(|e| SubmissionError::Internal(format!("fingerprint serialisation: {e}")))?;
    let hash = Sha256::digest(&bytes);
    Ok(base64::engine::general_purpose::STANDARD.encode(hash))
}
