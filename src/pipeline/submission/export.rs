//! Results Exporter: the current classified state of every row as CSV or
//! JSON. Registry messages are copied byte-for-byte.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::SubmissionError;
use super::progress::guidance_for;
use super::state::Submission;
use super::store::SubmissionStore;
use super::types::SubmissionId;
use crate::registry::wire::wire_date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub row_number: u32,
    pub batch_index: usize,
    pub status: String,
    pub action_required: String,
    pub status_code: String,
    pub message: String,
    pub guidance: String,
    pub claim_id: String,
    pub claim_sequence_number: String,
    pub resubmit_count: u32,
    pub delivery_uncertain: bool,
    pub failure_reason: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub medicare_card_number: String,
    pub medicare_irn: String,
    pub ihi_number: String,
    pub date_of_service: String,
    pub vaccine_codes: String,
}

const HEADER: [&str; 21] = [
    "rowNumber",
    "batchIndex",
    "status",
    "actionRequired",
    "statusCode",
    "message",
    "guidance",
    "claimId",
    "claimSequenceNumber",
    "resubmitCount",
    "deliveryUncertain",
    "failureReason",
    "firstName",
    "lastName",
    "dateOfBirth",
    "gender",
    "medicareCardNumber",
    "medicareIrn",
    "ihiNumber",
    "dateOfService",
    "vaccineCodes",
];

/// Status shown for a row whose batch has not been sent yet.
pub const NOT_DISPATCHED: &str = "NOT_DISPATCHED";

impl ExportRow {
    fn fields(&self) -> [String; 21] {
        [
            self.row_number.to_string(),
            self.batch_index.to_string(),
            self.status.clone(),
            self.action_required.clone(),
            self.status_code.clone(),
            self.message.clone(),
            self.guidance.clone(),
            self.claim_id.clone(),
            self.claim_sequence_number.clone(),
            self.resubmit_count.to_string(),
            self.delivery_uncertain.to_string(),
            self.failure_reason.clone(),
            self.first_name.clone(),
            self.last_name.clone(),
            self.date_of_birth.clone(),
            self.gender.clone(),
            self.medicare_card_number.clone(),
            self.medicare_irn.clone(),
            self.ihi_number.clone(),
            self.date_of_service.clone(),
            self.vaccine_codes.clone(),
        ]
    }
}

fn text(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

/// Rows in row order, reflecting the latest result and record version.
pub fn export_rows(submission: &Submission) -> Vec<ExportRow> {
    submission
        .rows
        .iter()
        .map(|(row, state)| {
            let ind = &state.record.individual;
            let enc = &state.record.encounter;
            let result = state.result.as_ref();
            ExportRow {
                row_number: *row,
                batch_index: state.batch_index,
                status: result.map_or(NOT_DISPATCHED.to_string(), |r| r.status.to_string()),
                action_required: result.map(|r| r.action_required.to_string()).unwrap_or_default(),
                status_code: result.and_then(|r| r.status_code.clone()).unwrap_or_default(),
                message: result.and_then(|r| r.message.clone()).unwrap_or_default(),
                guidance: result.and_then(guidance_for).unwrap_or_default().to_string(),
                claim_id: result.and_then(|r| r.claim_id.clone()).unwrap_or_default(),
                claim_sequence_number: result
                    .and_then(|r| r.claim_sequence_number.clone())
                    .unwrap_or_default(),
                resubmit_count: result.map_or(0, |r| r.resubmit_count),
                delivery_uncertain: result.is_some_and(|r| r.delivery_uncertain),
                failure_reason: result.and_then(|r| r.failure_reason.clone()).unwrap_or_default(),
                first_name: text(&ind.first_name),
                last_name: text(&ind.last_name),
                date_of_birth: ind.date_of_birth.map(wire_date).unwrap_or_default(),
                gender: text(&ind.gender),
                medicare_card_number: text(&ind.medicare_card_number),
                medicare_irn: text(&ind.medicare_irn),
                ihi_number: text(&ind.ihi_number),
                date_of_service: wire_date(enc.date_of_service),
                vaccine_codes: enc
                    .episodes
                    .iter()
                    .map(|e| e.vaccine_code.as_str())
                    .collect::<Vec<_>>()
                    .join(";"),
            }
        })
        .collect()
}

/// RFC 4180 field: quoted when it holds a comma, quote, CR or LF, with
/// inner quotes doubled. Content is otherwise untouched.
pub fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\r', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{}\r\n", HEADER.join(","));
    for row in rows {
        let line: Vec<String> = row.fields().iter().map(|f| csv_field(f)).collect();
        let _ = write!(out, "{}\r\n", line.join(","));
    }
    out
}

/// A rendered export ready to be served as a download.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    submission_id: SubmissionId,
    status: crate::models::SubmissionStatus,
    rows: &'a [ExportRow],
}

#[derive(Clone)]
pub struct ResultsExporter {
    store: Arc<SubmissionStore>,
}

impl ResultsExporter {
    pub fn new(store: Arc<SubmissionStore>) -> Self {
        Self { store }
    }

    pub async fn export(&self, id: SubmissionId, format: ExportFormat) -> Result<ExportDocument, SubmissionError> {
        let entry = self.store.get(id).await?;
        let (rows, status) = {
            let s = entry.read().await;
            (export_rows(&s), s.status())
        };
        tracing::debug!(submission_id = %id, rows = rows.len(), ?format, "Exporting results");

        match format {
            ExportFormat::Csv => Ok(ExportDocument {
                content_type: "text/csv; charset=utf-8",
                filename: format!("submission-{id}.csv"),
                body: to_csv(&rows),
            }),
            ExportFormat::Json => {
                let body = serde_json::to_string_pretty(&JsonExport {
                    submission_id: id,
                    status,
                    rows: &rows,
                })
                .map_err(|e| SubmissionError::Internal(format!("export serialisation: {e}")))?;
                Ok(ExportDocument {
                    content_type: "application/json",
                    filename: format!("submission-{id}.json"),
                    body,
                })
            }
        }
    }
}
