//! Invocation dispatch and completion contract enforcement.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use action_config::{ConfigError, KernelConfig, RequestParameters};
use action_policy::contracts::{ActionContext, ActionRequest, ContractViolation};
use action_policy::decision::ActionOutcome;
use action_policy::engine::{DecisionEngine, EngineError, EngineResult};
use action_primitives::{
    ActionTargetSet, CompletionStatus, GuardName, InvocationId, ProviderDescriptor, ServiceKind,
};
use action_telemetry::spans::invocation_span;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::registry::{ProviderRegistry, RegistryError};
use crate::scheduler::{SchedulerError, SchedulerResult, TaskScheduler};

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors preventing an invocation from producing a report.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Registry lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Kernel configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The request carries a parameter the kind does not declare.
    #[error("service kind `{kind}` does not accept request parameter `{name}`")]
    UnsupportedParameter {
        /// Target kind.
        kind: ServiceKind,
        /// Undeclared parameter.
        name: String,
    },
    /// Scheduler refused or abandoned the invocation.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// The invocation task panicked or was aborted.
    #[error("invocation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How an invocation ended, from the orchestrator's point of view.
#[derive(Debug)]
pub enum Verdict {
    /// The engine recorded exactly one valid completion and returned normally.
    Completed(ActionOutcome),
    /// The engine recorded a completion and then reported an infrastructure
    /// fault.
    Faulted {
        /// Completion recorded before the fault surfaced.
        outcome: ActionOutcome,
        /// Propagated fault.
        error: EngineError,
    },
    /// The engine broke the completion contract.
    Violation {
        /// Broken rule.
        violation: ContractViolation,
        /// First completion the engine attempted, if any.
        outcome: Option<ActionOutcome>,
        /// Error the engine returned or the panic it raised, if any.
        error: Option<EngineError>,
    },
    /// The orchestrator cancelled the invocation before a completion was recorded.
    Cancelled,
}

/// Final record of an invocation.
#[derive(Debug)]
pub struct InvocationReport {
    invocation_id: InvocationId,
    kind: ServiceKind,
    targets: ActionTargetSet,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    verdict: Verdict,
}

impl InvocationReport {
    /// Returns the invocation identifier.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the invoked kind.
    #[must_use]
    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Returns the targets with their final statuses.
    #[must_use]
    pub fn targets(&self) -> &ActionTargetSet {
        &self.targets
    }

    /// Returns when evaluation started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when the verdict was reached.
    #[must_use]
    pub const fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Returns the verdict.
    #[must_use]
    pub const fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Returns the status the orchestrator routes on. Contract violations count
    /// as [`CompletionStatus::Failed`]; cancelled invocations have none.
    #[must_use]
    pub fn completion_status(&self) -> Option<CompletionStatus> {
        match &self.verdict {
            Verdict::Completed(outcome) | Verdict::Faulted { outcome, .. } => Some(outcome.status()),
            Verdict::Violation { .. } => Some(CompletionStatus::Failed),
            Verdict::Cancelled => None,
        }
    }

    /// Returns the accepted outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<&ActionOutcome> {
        match &self.verdict {
            Verdict::Completed(outcome) | Verdict::Faulted { outcome, .. } => Some(outcome),
            Verdict::Violation { .. } | Verdict::Cancelled => None,
        }
    }

    /// Returns the guards the orchestrator routes on; empty unless an outcome
    /// was accepted.
    #[must_use]
    pub fn guards(&self) -> &[GuardName] {
        self.outcome().map(ActionOutcome::guards).unwrap_or_default()
    }

    /// Returns the infrastructure fault propagated by the engine, if any.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        match &self.verdict {
            Verdict::Faulted { error, .. } => Some(error),
            Verdict::Violation { error, .. } => error.as_ref(),
            Verdict::Completed(_) | Verdict::Cancelled => None,
        }
    }

    /// Returns the contract violation, if the engine broke the contract.
    #[must_use]
    pub fn violation(&self) -> Option<&ContractViolation> {
        match &self.verdict {
            Verdict::Violation { violation, .. } => Some(violation),
            _ => None,
        }
    }
}

/// Handle to an in-flight invocation.
#[derive(Debug)]
pub struct InvocationHandle {
    invocation_id: InvocationId,
    kind: ServiceKind,
    cancellation: CancellationToken,
    task: JoinHandle<SchedulerResult<InvocationReport>>,
}

impl InvocationHandle {
    /// Returns the invocation identifier.
    #[must_use]
    pub const fn id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the invoked kind.
    #[must_use]
    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Requests cancellation. Has no effect once a completion was recorded.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Waits for the invocation to finish.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Scheduler`] if the scheduler closed before the
    /// invocation started and [`KernelError::Join`] if the task panicked.
    pub async fn wait(self) -> KernelResult<InvocationReport> {
        Ok(self.task.await??)
    }
}

/// Dispatches invocations to registered engines and enforces the completion
/// contract on their behalf.
#[derive(Debug)]
pub struct ActionKernel {
    registry: Arc<ProviderRegistry>,
    scheduler: TaskScheduler,
    config: KernelConfig,
}

impl ActionKernel {
    /// Creates a kernel over `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Config`] when `config` fails validation.
    pub fn new(registry: Arc<ProviderRegistry>, config: KernelConfig) -> KernelResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            scheduler: TaskScheduler::new(config.into()),
            config,
        })
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Returns the kernel configuration.
    #[must_use]
    pub const fn config(&self) -> KernelConfig {
        self.config
    }

    /// Returns the scheduler running invocations.
    #[must_use]
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Starts an invocation of `kind` over `targets`.
    ///
    /// # Errors
    ///
    /// Fails before anything runs when the kind has no engine, a parameter is
    /// rejected under strict checking, or the scheduler is closed.
    pub fn invoke(
        &self,
        kind: &ServiceKind,
        targets: ActionTargetSet,
        parameters: RequestParameters,
    ) -> KernelResult<InvocationHandle> {
        let engine = self.registry.engine(kind.as_str())?;
        let descriptor = self.registry.describe(kind.as_str())?;
        self.check_parameters(&descriptor, &parameters)?;

        let request = ActionRequest::new(kind.clone(), targets).with_parameters(parameters);
        let invocation_id = request.invocation_id();
        let cancellation = CancellationToken::new();
        let span = invocation_span(kind, invocation_id);

        let task = self.scheduler.spawn(
            execute(engine, descriptor, request, cancellation.clone()).instrument(span),
        )?;

        Ok(InvocationHandle {
            invocation_id,
            kind: kind.clone(),
            cancellation,
            task,
        })
    }

    /// Invokes `kind` and waits for its report.
    ///
    /// # Errors
    ///
    /// See [`invoke`](Self::invoke) and [`InvocationHandle::wait`].
    pub async fn run(
        &self,
        kind: &ServiceKind,
        targets: ActionTargetSet,
        parameters: RequestParameters,
    ) -> KernelResult<InvocationReport> {
        self.invoke(kind, targets, parameters)?.wait().await
    }

    /// Stops accepting invocations. Invocations still waiting for a slot fail
    /// with [`KernelError::Scheduler`].
    pub fn shutdown(&self) {
        self.scheduler.close();
    }

    fn check_parameters(
        &self,
        descriptor: &ProviderDescriptor,
        parameters: &RequestParameters,
    ) -> KernelResult<()> {
        for name in parameters.keys() {
            if descriptor.declares_parameter(name) {
                continue;
            }
            if self.config.strict_parameters() {
                return Err(KernelError::UnsupportedParameter {
                    kind: descriptor.kind().clone(),
                    name: name.to_owned(),
                });
            }
            warn!(kind = %descriptor.kind(), parameter = name, "ignoring undeclared request parameter");
        }
        Ok(())
    }
}

async fn execute(
    engine: Arc<dyn DecisionEngine>,
    descriptor: Arc<ProviderDescriptor>,
    request: ActionRequest,
    cancellation: CancellationToken,
) -> InvocationReport {
    let started_at = Utc::now();
    let invocation_id = request.invocation_id();
    let kind = request.kind().clone();
    let mut ctx = ActionContext::new(request, descriptor, cancellation.clone());

    let caught = tokio::select! {
        biased;
        () = cancellation.cancelled() => Ok(Err(EngineError::Cancelled)),
        caught = AssertUnwindSafe(engine.evaluate(&mut ctx)).catch_unwind() => caught,
    };

    let (request, record) = ctx.into_parts();
    let attempted = record.outcome().cloned();
    let verdict = match caught {
        // An engine that unwinds never returns, so any completion it recorded is void.
        Err(payload) => Verdict::Violation {
            violation: ContractViolation::NoCompletion,
            outcome: attempted,
            error: Some(EngineError::evaluation(format!(
                "engine panicked: {}",
                panic_message(payload.as_ref())
            ))),
        },
        Ok(result) => judge(result, record.verify(), attempted),
    };

    let completed_at = Utc::now();
    let mut targets = request.into_targets();
    match &verdict {
        Verdict::Completed(outcome) | Verdict::Faulted { outcome, .. } => {
            targets.settle(outcome.status(), completed_at);
        }
        Verdict::Violation { .. } => targets.settle(CompletionStatus::Failed, completed_at),
        Verdict::Cancelled => targets.cancel(completed_at),
    }

    log_verdict(&kind, invocation_id, &verdict);

    InvocationReport {
        invocation_id,
        kind,
        targets,
        started_at,
        completed_at,
        verdict,
    }
}

fn judge(
    result: EngineResult<()>,
    verified: Result<ActionOutcome, ContractViolation>,
    attempted: Option<ActionOutcome>,
) -> Verdict {
    match (result, verified) {
        (Ok(()), Ok(outcome)) => Verdict::Completed(outcome),
        // Cancellation after the callback fired does not revoke the result.
        (Err(EngineError::Cancelled), Ok(outcome)) => Verdict::Completed(outcome),
        (Err(error), Ok(outcome)) => Verdict::Faulted { outcome, error },
        (Err(EngineError::Cancelled), Err(ContractViolation::NoCompletion)) => Verdict::Cancelled,
        (result, Err(violation)) => Verdict::Violation {
            violation,
            outcome: attempted,
            error: result.err(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn log_verdict(kind: &ServiceKind, invocation_id: InvocationId, verdict: &Verdict) {
    match verdict {
        Verdict::Completed(outcome) => info!(
            %kind,
            %invocation_id,
            status = %outcome.status(),
            guards = ?outcome.guards(),
            "invocation completed"
        ),
        Verdict::Faulted { outcome, error } => warn!(
            %kind,
            %invocation_id,
            status = %outcome.status(),
            guards = ?outcome.guards(),
            %error,
            "invocation completed with an infrastructure fault"
        ),
        Verdict::Violation { violation, error: cause, .. } => error!(
            %kind,
            %invocation_id,
            contract_violation = true,
            %violation,
            cause = ?cause,
            "engine broke the completion contract"
        ),
        Verdict::Cancelled => warn!(%kind, %invocation_id, "invocation cancelled"),
    }
}
