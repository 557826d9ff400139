//! Submission & Confirmation Pipeline.
//!
//! validated records → grouper → dispatcher (→ registry) → classifier →
//! progress tracker → confirmation / correction → exporter.
//!
//! All state lives in memory in a `SubmissionStore`; each submission has a
//! single writer lock shared by the background worker and both engines.

pub mod classifier;
pub mod confirmation;
pub mod correction;
pub mod dispatcher;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod grouper;
pub mod progress;
pub mod retry;
pub mod service;
pub mod state;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::RecordClassifier;
pub use confirmation::{ConfirmAllReport, ConfirmationEngine, ConfirmationOutcome};
pub use correction::{CorrectionEngine, RecordCorrection};
pub use dispatcher::{StartReceipt, StartRequest, SubmissionDispatcher};
pub use error::{FieldViolation, GroupingError, SubmissionError, ValidationError};
pub use export::{ExportDocument, ExportFormat, ResultsExporter};
pub use grouper::GroupingLimits;
pub use progress::{ProgressTracker, RecordDetail, ResultsPage, ResultsQuery, SubmissionProgress};
pub use retry::RetryPolicy;
pub use service::SubmissionPipeline;
pub use store::{SubmissionStore, SubmissionSummary};
pub use types::{RecordResult, SubmissionId};
