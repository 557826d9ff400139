pub mod encounter;
pub mod enums;
pub mod individual;

pub use encounter::{Encounter, EncounterRecord, Episode, InformationProvider};
pub use enums::{ActionRequired, AttemptKind, BatchStatus, InvalidEnum, RecordStatus, SubmissionStatus};
pub use individual::{IdentificationScenario, IndividualIdentifier};
