//! Decision engine trait, engine errors, and target-count enforcement.

use std::sync::Arc;

use action_config::ConfigError;
use action_primitives::{
    ActionTargetSet, CompletionStatus, ElementGuid, GuardToken, ProviderDescriptor,
    SupportedCardinalities, TargetCardinality,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::contracts::ActionContext;
use crate::decision::ActionOutcome;
use crate::integrations::AccessorError;

/// Infrastructure faults surfaced by decision engines.
///
/// Domain outcomes (missing classifications, wrong target types, unsupported
/// target counts) are never errors; they are recorded through
/// [`ActionContext::record_completion`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The orchestrator cancelled the invocation before a completion was recorded.
    #[error("invocation cancelled")]
    Cancelled,
    /// A target element could not be resolved through the element accessor.
    #[error("could not resolve element {guid}: {source}")]
    Resolution {
        /// Element that failed to resolve.
        guid: ElementGuid,
        /// Underlying accessor failure.
        #[source]
        source: AccessorError,
    },
    /// Evaluation failed for a reason other than resolution.
    #[error("evaluation failed: {reason}")]
    Evaluation {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
    /// Request parameters could not be turned into engine policy.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A primitive invariant was violated while updating targets.
    #[error(transparent)]
    Primitive(#[from] action_primitives::Error),
}

impl EngineError {
    /// Convenience helper to construct evaluation errors.
    #[must_use]
    pub fn evaluation(reason: impl Into<String>) -> Self {
        Self::Evaluation {
            reason: reason.into(),
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Evaluation logic of one governance action service kind.
///
/// Implementations hold no per-invocation state: everything an invocation
/// needs lives in the [`ActionContext`] it is handed, so one engine instance
/// serves any number of concurrent invocations.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Returns the static descriptor of the kind this engine implements.
    fn descriptor(&self) -> Arc<ProviderDescriptor>;

    /// Evaluates the context's targets and records exactly one completion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when cancelled before completion, or
    /// another [`EngineError`] for infrastructure faults. A faulting engine
    /// still records a FAILED completion before returning the error.
    async fn evaluate(&self, ctx: &mut ActionContext) -> EngineResult<()>;
}

/// Short-circuits target counts the kind does not support.
///
/// Returns an INVALID outcome carrying the single guard chosen by `guard_for`
/// when the set's cardinality is not in `supported`, and `None` otherwise.
/// Callers must record the returned outcome without evaluating any target.
pub fn enforce_cardinality<G, F>(
    supported: SupportedCardinalities,
    targets: &ActionTargetSet,
    guard_for: F,
) -> Option<ActionOutcome>
where
    G: GuardToken,
    F: FnOnce(TargetCardinality) -> G,
{
    let cardinality = targets.cardinality();
    if supported.allows(cardinality) {
        return None;
    }

    let guard = guard_for(cardinality);
    debug!(
        ?cardinality,
        targets = targets.len(),
        guard = guard.name(),
        "unsupported target cardinality"
    );
    Some(
        ActionOutcome::single(CompletionStatus::Invalid, guard)
            .with_output("targetCount", targets.len()),
    )
}

#[cfg(test)]
mod tests {
    use action_primitives::{ActionTarget, ElementRef};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum CountGuard {
        None,
        Several,
    }

    impl GuardToken for CountGuard {
        fn all() -> &'static [Self] {
            &[Self::None, Self::Several]
        }

        fn name(self) -> &'static str {
            match self {
                Self::None => "no-targets-detected",
                Self::Several => "multiple-targets-detected",
            }
        }

        fn description(self) -> &'static str {
            "count guard"
        }

        fn typical_completion_status(self) -> CompletionStatus {
            CompletionStatus::Invalid
        }
    }

    fn guard_for(cardinality: TargetCardinality) -> CountGuard {
        match cardinality {
            TargetCardinality::Zero => CountGuard::None,
            TargetCardinality::One | TargetCardinality::Many => CountGuard::Several,
        }
    }

    fn targets(count: usize) -> ActionTargetSet {
        (0..count)
            .map(|i| {
                let element = ElementRef::new(ElementGuid::random(), "Asset").unwrap();
                ActionTarget::new(format!("t{i}"), element).unwrap()
            })
            .collect()
    }

    #[test]
    fn supported_counts_pass_through() {
        let supported = SupportedCardinalities::single_only();
        assert!(enforce_cardinality(supported, &targets(1), guard_for).is_none());
    }

    #[test]
    fn unsupported_counts_yield_single_invalid_guard() {
        let supported = SupportedCardinalities::single_only();

        let empty = enforce_cardinality(supported, &targets(0), guard_for).unwrap();
        assert_eq!(empty.status(), CompletionStatus::Invalid);
        assert_eq!(empty.guards().len(), 1);
        assert!(empty.has_guard("no-targets-detected"));

        for count in [2, 3, 7] {
            let many = enforce_cardinality(supported, &targets(count), guard_for).unwrap();
            assert_eq!(many.status(), CompletionStatus::Invalid);
            assert_eq!(many.guards().len(), 1);
            assert!(many.has_guard("multiple-targets-detected"));
        }
    }
}
