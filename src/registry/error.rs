use thiserror::Error;

/// Failure to get a usable answer out of the registry endpoint.
///
/// A registry-classified warning or error is NOT a transport failure; it
/// arrives as a normal `RegistryResponse`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Registry call timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to registry at {0}")]
    Connection(String),

    #[error("Registry returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Registry response could not be decoded: {0}")]
    Decode(String),

    /// The connection broke after the request may have reached the registry.
    #[error("Registry exchange interrupted: {0}")]
    Interrupted(String),

    #[error("Registry request could not be built: {0}")]
    Request(String),
}

impl TransportError {
    /// Worth another attempt with the same payload.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) | Self::Interrupted(_) => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Request(_) => false,
        }
    }

    /// The registry may have processed the request even though no answer came back.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Interrupted(_))
    }
}
