//! Shared error definitions for governance action primitives.

use thiserror::Error;
use uuid::Error as UuidError;

use crate::TargetStatus;

/// Result alias used throughout the governance action crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or mutating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided GUID could not be parsed.
    #[error("invalid guid: {source}")]
    InvalidGuid {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// A guard, service kind, or other token failed identifier validation.
    #[error("invalid identifier `{id}`: {reason}")]
    InvalidIdentifier {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Guard catalog definition failed validation.
    #[error("invalid guard catalog: {reason}")]
    InvalidCatalog {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Provider descriptor failed validation.
    #[error("invalid provider descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Action target definition failed validation.
    #[error("invalid action target: {reason}")]
    InvalidTarget {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A per-target status change was not permitted by the target lifecycle.
    #[error("invalid action target transition for `{target}` from {from:?} to {to:?}")]
    InvalidTransition {
        /// Role name of the target whose transition failed.
        target: String,
        /// Status prior to the attempted transition.
        from: TargetStatus,
        /// Status that was requested.
        to: TargetStatus,
    },
}

impl Error {
    pub(crate) fn identifier(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
