//! Invocation request and the completion callback contract.

use std::sync::Arc;

use action_config::RequestParameters;
use action_primitives::{
    ActionTargetSet, GuardName, InvocationId, ProviderDescriptor, ServiceKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::decision::ActionOutcome;
use crate::engine::{EngineError, EngineResult};

/// Work handed to a decision engine by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    invocation_id: InvocationId,
    kind: ServiceKind,
    targets: ActionTargetSet,
    #[serde(default)]
    parameters: RequestParameters,
}

impl ActionRequest {
    /// Creates a request for the given kind and targets.
    #[must_use]
    pub fn new(kind: ServiceKind, targets: ActionTargetSet) -> Self {
        Self {
            invocation_id: InvocationId::random(),
            kind,
            targets,
            parameters: RequestParameters::default(),
        }
    }

    /// Attaches request parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: RequestParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the requested service kind.
    #[must_use]
    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Returns the targets.
    #[must_use]
    pub fn targets(&self) -> &ActionTargetSet {
        &self.targets
    }

    /// Returns the request parameters.
    #[must_use]
    pub fn parameters(&self) -> &RequestParameters {
        &self.parameters
    }

    /// Consumes the request, returning its targets.
    #[must_use]
    pub fn into_targets(self) -> ActionTargetSet {
        self.targets
    }
}

/// Ways an engine can break the completion contract.
///
/// These indicate a broken service kind, not a bad target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// The engine returned without recording a completion.
    #[error("engine returned without recording a completion")]
    NoCompletion,
    /// The engine recorded a completion more than once.
    #[error("engine recorded {count} completions")]
    MultipleCompletions {
        /// Number of times the callback was invoked.
        count: usize,
    },
    /// The engine emitted a guard its descriptor does not declare.
    #[error("engine emitted undeclared guard `{guard}`")]
    UndeclaredGuard {
        /// The offending guard.
        guard: GuardName,
    },
}

/// What the completion callback observed during one invocation.
#[derive(Debug, Clone, Default)]
pub struct CompletionRecord {
    outcome: Option<ActionOutcome>,
    calls: usize,
    rejected_guard: Option<GuardName>,
    recorded_at: Option<DateTime<Utc>>,
}

impl CompletionRecord {
    /// Returns the first outcome recorded, even if it was later invalidated.
    #[must_use]
    pub fn outcome(&self) -> Option<&ActionOutcome> {
        self.outcome.as_ref()
    }

    /// Returns how many times the callback was invoked.
    #[must_use]
    pub const fn calls(&self) -> usize {
        self.calls
    }

    /// Returns when the first completion was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.recorded_at
    }

    /// Checks the record against the completion contract.
    ///
    /// # Errors
    ///
    /// Returns the [`ContractViolation`] the engine committed, if any.
    pub fn verify(self) -> Result<ActionOutcome, ContractViolation> {
        if let Some(guard) = self.rejected_guard {
            return Err(ContractViolation::UndeclaredGuard { guard });
        }
        match (self.calls, self.outcome) {
            (1, Some(outcome)) => Ok(outcome),
            (0, _) | (_, None) => Err(ContractViolation::NoCompletion),
            (count, _) => Err(ContractViolation::MultipleCompletions { count }),
        }
    }
}

/// Per-invocation context passed to [`crate::engine::DecisionEngine::evaluate`].
///
/// Owns the invocation's targets exclusively. Nothing in it outlives the
/// invocation.
#[derive(Debug)]
pub struct ActionContext {
    request: ActionRequest,
    descriptor: Arc<ProviderDescriptor>,
    cancellation: CancellationToken,
    completion: CompletionRecord,
}

impl ActionContext {
    /// Creates a context for a request against the kind described by `descriptor`.
    #[must_use]
    pub fn new(
        request: ActionRequest,
        descriptor: Arc<ProviderDescriptor>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            request,
            descriptor,
            cancellation,
            completion: CompletionRecord::default(),
        }
    }

    /// Returns the invocation identifier.
    #[must_use]
    pub fn invocation_id(&self) -> InvocationId {
        self.request.invocation_id
    }

    /// Returns the descriptor of the kind being invoked.
    #[must_use]
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Returns the targets.
    #[must_use]
    pub fn targets(&self) -> &ActionTargetSet {
        &self.request.targets
    }

    /// Returns the targets for status and timestamp updates.
    pub fn targets_mut(&mut self) -> &mut ActionTargetSet {
        &mut self.request.targets
    }

    /// Returns the request parameters.
    #[must_use]
    pub fn parameters(&self) -> &RequestParameters {
        &self.request.parameters
    }

    /// Returns `true` once the orchestrator asked for cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with [`EngineError::Cancelled`] when cancellation was requested.
    ///
    /// Engines call this between resolve/evaluate phases.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when the invocation was cancelled.
    pub fn checkpoint(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Records the invocation's outcome. Must be called exactly once.
    ///
    /// The first accepted call settles every open target to the outcome's
    /// status. Once a completion has been recorded, cancellation no longer
    /// applies. Extra calls and undeclared guards are remembered and reported
    /// as contract violations after the engine returns.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] when cancellation was requested
    /// before the first completion; nothing is recorded in that case.
    pub fn record_completion(&mut self, outcome: ActionOutcome) -> EngineResult<()> {
        if self.completion.calls == 0 {
            self.checkpoint()?;
        }

        self.completion.calls += 1;
        if self.completion.calls > 1 {
            warn!(
                invocation_id = %self.request.invocation_id,
                kind = %self.request.kind,
                calls = self.completion.calls,
                "completion recorded more than once"
            );
            return Ok(());
        }

        let catalog = self.descriptor.produced_guards();
        if let Some(guard) = catalog.first_undeclared(outcome.guards()) {
            warn!(
                invocation_id = %self.request.invocation_id,
                kind = %self.request.kind,
                %guard,
                "completion carries an undeclared guard"
            );
            self.completion.rejected_guard = Some(guard.clone());
            self.completion.outcome = Some(outcome);
            return Ok(());
        }

        let now = Utc::now();
        self.request.targets.settle(outcome.status(), now);
        debug!(
            invocation_id = %self.request.invocation_id,
            status = %outcome.status(),
            guards = ?outcome.guards(),
            "completion recorded"
        );
        self.completion.recorded_at = Some(now);
        self.completion.outcome = Some(outcome);
        Ok(())
    }

    /// Returns how many times the completion callback has been invoked.
    #[must_use]
    pub const fn completion_calls(&self) -> usize {
        self.completion.calls
    }

    /// Splits the context into the (mutated) request and the completion record.
    #[must_use]
    pub fn into_parts(self) -> (ActionRequest, CompletionRecord) {
        (self.request, self.completion)
    }
}
