//! Per-target progress state machine.
//!
//! `Waiting -> InProgress -> {Actioned | Invalid | Ignored | Failed}`, with
//! `Cancelled` reachable from either non-terminal state.

use serde::{Deserialize, Serialize};

use crate::CompletionStatus;

/// Progress of a single action target within an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Supplied by the orchestrator; the engine has not looked at it yet.
    Waiting,
    /// The engine is inspecting the target.
    InProgress,
    /// The target was processed.
    Actioned,
    /// The target could not be processed as supplied.
    Invalid,
    /// The target needed no processing.
    Ignored,
    /// Processing the target failed.
    Failed,
    /// The invocation was cancelled before the target reached an outcome.
    Cancelled,
}

impl TargetStatus {
    /// Returns `true` once no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Waiting | Self::InProgress)
    }

    /// Returns the status reached by applying `event`, if the move is legal.
    #[must_use]
    pub const fn next(self, event: TargetEvent) -> Option<Self> {
        match (self, event) {
            (Self::Waiting, TargetEvent::Begin) => Some(Self::InProgress),
            (Self::InProgress, TargetEvent::Complete(status)) => Some(status.target_status()),
            (Self::Waiting | Self::InProgress, TargetEvent::Cancel) => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Events that move an action target through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    /// The engine starts inspecting the target.
    Begin,
    /// The target's contribution to the outcome has been emitted.
    Complete(CompletionStatus),
    /// The invocation was cancelled.
    Cancel,
}
