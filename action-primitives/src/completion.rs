//! Completion status reported once per invocation.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::TargetStatus;

/// Describes how an invocation of a governance action service concluded.
///
/// Exactly one value is reported per invocation, always chosen by the
/// decision engine. The orchestrator routes on it together with the emitted
/// guards and never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// The requested work was carried out.
    Actioned,
    /// The request could not be processed as supplied (wrong targets, wrong type).
    Invalid,
    /// The request was valid but nothing needed doing.
    Ignored,
    /// The work was attempted and failed.
    Failed,
}

impl CompletionStatus {
    /// Returns the terminal target status matching this completion status.
    #[must_use]
    pub const fn target_status(self) -> TargetStatus {
        match self {
            Self::Actioned => TargetStatus::Actioned,
            Self::Invalid => TargetStatus::Invalid,
            Self::Ignored => TargetStatus::Ignored,
            Self::Failed => TargetStatus::Failed,
        }
    }

    /// Returns the lowercase label used in logs and serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Actioned => "actioned",
            Self::Invalid => "invalid",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }
}

impl Display for CompletionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
