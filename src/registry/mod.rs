//! Registry protocol boundary.
//!
//! Wire shapes, the typed outcome union, the client trait with its HTTP and
//! mock implementations, and the supplementary guidance table.

pub mod client;
pub mod error;
pub mod guidance;
pub mod mock;
pub mod outcome;
pub mod wire;

pub use client::{HttpRegistryClient, RegistryClient};
pub use error::TransportError;
pub use mock::{MockRegistryClient, MockReply};
pub use outcome::{CodeClass, EpisodeOutcome, RegistryOutcome, RegistryReply};
pub use wire::{EncounterRequest, RegistryResponse};
