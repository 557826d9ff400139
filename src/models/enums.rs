use serde::{Deserialize, Serialize};

/// Unknown string value for a closed set of wire/status names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident, $case:literal { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = $case)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(BatchStatus, "snake_case" {
    Draft => "draft",
    Validating => "validating",
    Validated => "validated",
    Submitting => "submitting",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(RecordStatus, "SCREAMING_SNAKE_CASE" {
    Success => "SUCCESS",
    Warning => "WARNING",
    Error => "ERROR",
    NotAttempted => "NOT_ATTEMPTED",
});

str_enum!(ActionRequired, "SCREAMING_SNAKE_CASE" {
    None => "NONE",
    ConfirmOrCorrect => "CONFIRM_OR_CORRECT",
});

str_enum!(SubmissionStatus, "snake_case" {
    Running => "running",
    Paused => "paused",
    Completed => "completed",
    Error => "error",
});

str_enum!(AttemptKind, "snake_case" {
    Initial => "initial",
    Confirmation => "confirmation",
    Correction => "correction",
});

impl BatchStatus {
    /// Completed or failed: the dispatcher will not touch the batch again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Allowed forward edges of the batch lifecycle.
    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Validating)
                | (Self::Validating, Self::Validated)
                | (Self::Validated, Self::Submitting)
                | (Self::Submitting, Self::Completed)
                | (Self::Submitting, Self::Failed)
        )
    }
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}
