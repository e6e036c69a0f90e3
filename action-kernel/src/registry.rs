//! Provider registry: one descriptor (and optionally one engine) per service kind.
//!
//! The registry is populated during start-up and then sealed; afterwards it is
//! only read, by wiring validation and by the kernel when it dispatches
//! invocations.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use action_policy::engine::DecisionEngine;
use action_primitives::{ProviderDescriptor, ServiceKind};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::wiring::{ProcessWiring, WiringProblem};

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors surfaced by the provider registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A different descriptor is already registered for the kind.
    #[error("service kind `{kind}` is already registered with a different descriptor")]
    DuplicateKind {
        /// Conflicting kind.
        kind: ServiceKind,
    },
    /// An engine is already bound to the kind.
    #[error("service kind `{kind}` already has a decision engine")]
    EngineAlreadyBound {
        /// Conflicting kind.
        kind: ServiceKind,
    },
    /// No descriptor is registered for the kind.
    #[error("unknown service kind `{kind}`")]
    UnknownKind {
        /// Requested kind.
        kind: String,
    },
    /// The kind is described but has no engine to run invocations.
    #[error("service kind `{kind}` has no decision engine")]
    EngineMissing {
        /// Requested kind.
        kind: ServiceKind,
    },
    /// The guard is not part of the kind's catalog.
    #[error("service kind `{kind}` never produces guard `{guard}`")]
    UnknownGuard {
        /// Producing kind.
        kind: ServiceKind,
        /// Offending guard.
        guard: String,
    },
    /// A process definition failed validation.
    #[error("process `{process}` has {} wiring problem(s)", .problems.len())]
    InvalidWiring {
        /// Process name.
        process: String,
        /// Every problem found.
        problems: Vec<WiringProblem>,
    },
    /// Registration attempted after the registry was sealed.
    #[error("registry is sealed")]
    Sealed,
    /// A writer panicked while holding the registry lock.
    #[error("registry lock poisoned")]
    Poisoned,
}

struct Registration {
    descriptor: Arc<ProviderDescriptor>,
    engine: Option<Arc<dyn DecisionEngine>>,
}

/// Thread-safe registry of provider descriptors and decision engines.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ServiceKind, Registration>>,
    sealed: AtomicBool,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = self.kinds().unwrap_or_default();
        f.debug_struct("ProviderRegistry")
            .field("kinds", &kinds)
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor without an engine, for kinds implemented elsewhere
    /// that processes still need to validate against.
    ///
    /// Registering an identical descriptor again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateKind`] if the kind is registered with a
    /// different descriptor and [`RegistryError::Sealed`] after [`seal`](Self::seal).
    pub fn register(
        &self,
        descriptor: ProviderDescriptor,
    ) -> RegistryResult<Arc<ProviderDescriptor>> {
        self.insert(Arc::new(descriptor), None)
    }

    /// Registers an engine together with the descriptor it advertises.
    ///
    /// An engine may be attached to a kind whose identical descriptor was
    /// registered earlier through [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateKind`] on a descriptor mismatch,
    /// [`RegistryError::EngineAlreadyBound`] if the kind already has an engine,
    /// and [`RegistryError::Sealed`] after [`seal`](Self::seal).
    pub fn register_engine(
        &self,
        engine: Arc<dyn DecisionEngine>,
    ) -> RegistryResult<Arc<ProviderDescriptor>> {
        self.insert(engine.descriptor(), Some(engine))
    }

    fn insert(
        &self,
        descriptor: Arc<ProviderDescriptor>,
        engine: Option<Arc<dyn DecisionEngine>>,
    ) -> RegistryResult<Arc<ProviderDescriptor>> {
        if self.is_sealed() {
            return Err(RegistryError::Sealed);
        }

        let mut providers = self.providers.write().map_err(|_| RegistryError::Poisoned)?;
        let kind = descriptor.kind().clone();

        if let Some(existing) = providers.get_mut(&kind) {
            if *existing.descriptor != *descriptor {
                warn!(%kind, "conflicting descriptor registration rejected");
                return Err(RegistryError::DuplicateKind { kind });
            }
            if engine.is_some() {
                if existing.engine.is_some() {
                    return Err(RegistryError::EngineAlreadyBound { kind });
                }
                existing.engine = engine;
                debug!(%kind, "engine attached to registered kind");
            }
            return Ok(Arc::clone(&existing.descriptor));
        }

        info!(
            %kind,
            version = descriptor.version(),
            guards = descriptor.produced_guards().len(),
            has_engine = engine.is_some(),
            "service kind registered"
        );
        providers.insert(
            kind,
            Registration {
                descriptor: Arc::clone(&descriptor),
                engine,
            },
        );
        Ok(descriptor)
    }

    /// Ends the registration phase. Later registrations fail with
    /// [`RegistryError::Sealed`].
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            debug!("provider registry sealed");
        }
    }

    /// Returns `true` once the registry has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Returns the registered descriptor for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownKind`] when nothing is registered.
    pub fn describe(&self, kind: &str) -> RegistryResult<Arc<ProviderDescriptor>> {
        let providers = self.providers.read().map_err(|_| RegistryError::Poisoned)?;
        providers
            .get(kind)
            .map(|registration| Arc::clone(&registration.descriptor))
            .ok_or_else(|| RegistryError::UnknownKind { kind: kind.to_owned() })
    }

    /// Returns the engine bound to `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownKind`] or [`RegistryError::EngineMissing`].
    pub fn engine(&self, kind: &str) -> RegistryResult<Arc<dyn DecisionEngine>> {
        let providers = self.providers.read().map_err(|_| RegistryError::Poisoned)?;
        let (kind, registration) = providers
            .get_key_value(kind)
            .ok_or_else(|| RegistryError::UnknownKind { kind: kind.to_owned() })?;
        registration
            .engine
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| RegistryError::EngineMissing { kind: kind.clone() })
    }

    /// Lists registered kinds in name order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if the lock is poisoned.
    pub fn kinds(&self) -> RegistryResult<Vec<ServiceKind>> {
        let providers = self.providers.read().map_err(|_| RegistryError::Poisoned)?;
        let mut kinds: Vec<ServiceKind> = providers.keys().cloned().collect();
        kinds.sort();
        Ok(kinds)
    }

    /// Checks that a process may route `guard` from a step of `from_kind` to a
    /// step of `to_kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownKind`] if either kind is unregistered and
    /// [`RegistryError::UnknownGuard`] if `from_kind` never produces `guard`.
    pub fn validate_transition(
        &self,
        from_kind: &str,
        guard: &str,
        to_kind: &str,
    ) -> RegistryResult<()> {
        let producer = self.describe(from_kind)?;
        self.describe(to_kind)?;

        if !producer.produces(guard) {
            return Err(RegistryError::UnknownGuard {
                kind: producer.kind().clone(),
                guard: guard.to_owned(),
            });
        }
        Ok(())
    }

    /// Validates every step and transition of a process, reporting all problems
    /// at once.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidWiring`] listing each problem found.
    pub fn validate_wiring(&self, wiring: &ProcessWiring) -> RegistryResult<()> {
        let providers = self.providers.read().map_err(|_| RegistryError::Poisoned)?;
        let mut problems = Vec::new();

        for (step, kind) in wiring.steps() {
            if !providers.contains_key(kind) {
                problems.push(WiringProblem::UnknownKind {
                    step: step.to_owned(),
                    kind: kind.clone(),
                });
            }
        }

        for transition in wiring.transitions() {
            for step in [transition.from_step(), transition.to_step()] {
                if wiring.step_kind(step).is_none() {
                    problems.push(WiringProblem::UndefinedStep { step: step.to_owned() });
                }
            }

            let Some(kind) = wiring.step_kind(transition.from_step()) else {
                continue;
            };
            let Some(registration) = providers.get(kind) else {
                continue;
            };
            if !registration.descriptor.produces(transition.guard().as_str()) {
                problems.push(WiringProblem::UnknownGuard {
                    step: transition.from_step().to_owned(),
                    kind: kind.clone(),
                    guard: transition.guard().clone(),
                });
            }
        }

        if problems.is_empty() {
            debug!(process = wiring.name(), "process wiring validated");
            return Ok(());
        }

        for problem in &problems {
            warn!(process = wiring.name(), %problem, "invalid process wiring");
        }
        Err(RegistryError::InvalidWiring {
            process: wiring.name().to_owned(),
            problems,
        })
    }
}

#[cfg(test)]
mod tests {
    use action_primitives::{
        CompletionStatus, ConnectorIdentity, ElementGuid, GuardCatalog, GuardName, GuardType,
    };

    use super::*;

    fn guard(name: &str) -> GuardName {
        GuardName::new(name).unwrap()
    }

    fn descriptor(kind: &str, guards: &[&str]) -> ProviderDescriptor {
        let mut catalog = GuardCatalog::builder();
        for name in guards {
            catalog = catalog
                .add(GuardType::new(guard(name), CompletionStatus::Actioned, "test guard").unwrap())
                .unwrap();
        }
        let connector =
            ConnectorIdentity::new(ElementGuid::random(), format!("{kind}.connector")).unwrap();
        ProviderDescriptor::builder(ServiceKind::new(kind).unwrap(), connector)
            .version("1.0.0")
            .unwrap()
            .produced_guards(catalog.build().unwrap())
            .build()
            .unwrap()
    }

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        registry
            .register(descriptor("verify-asset", &["no-origin", "origin-assigned"]))
            .unwrap();
        registry.register(descriptor("quarantine-asset", &["quarantined"])).unwrap();
        registry
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let registry = registry();
        let original = registry.describe("quarantine-asset").unwrap();
        let again = registry.register(original.as_ref().clone()).unwrap();
        assert_eq!(again, original);
        assert_eq!(registry.kinds().unwrap().len(), 2);
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let registry = registry();
        let err = registry
            .register(descriptor("verify-asset", &["no-origin"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKind { .. }));
        assert!(registry.describe("verify-asset").unwrap().produces("origin-assigned"));
    }

    #[test]
    fn sealed_registry_refuses_registration() {
        let registry = registry();
        registry.seal();
        let err = registry.register(descriptor("archive-asset", &["archived"])).unwrap_err();
        assert!(matches!(err, RegistryError::Sealed));
        assert!(registry.describe("verify-asset").is_ok());
    }

    #[test]
    fn describe_and_engine_report_missing_kinds() {
        let registry = registry();
        assert!(matches!(
            registry.describe("nope"),
            Err(RegistryError::UnknownKind { .. })
        ));
        assert!(matches!(
            registry.engine("verify-asset"),
            Err(RegistryError::EngineMissing { .. })
        ));
    }

    #[test]
    fn validate_transition_checks_the_producer_catalog() {
        let registry = registry();
        registry
            .validate_transition("verify-asset", "no-origin", "quarantine-asset")
            .unwrap();

        let err = registry
            .validate_transition("verify-asset", "quarantined", "quarantine-asset")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownGuard { ref guard, .. } if guard == "quarantined"));

        let err = registry
            .validate_transition("verify-asset", "no-origin", "archive-asset")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind { ref kind } if kind == "archive-asset"));
    }

    #[test]
    fn validate_wiring_collects_every_problem() {
        let registry = registry();
        let good = ProcessWiring::new("onboard")
            .with_step("verify", ServiceKind::new("verify-asset").unwrap())
            .with_step("quarantine", ServiceKind::new("quarantine-asset").unwrap())
            .with_transition("verify", guard("no-origin"), "quarantine");
        registry.validate_wiring(&good).unwrap();

        let bad = good
            .with_step("archive", ServiceKind::new("archive-asset").unwrap())
            .with_transition("verify", guard("no-owner"), "quarantine")
            .with_transition("quarantine", guard("quarantined"), "publish");

        let Err(RegistryError::InvalidWiring { process, problems }) = registry.validate_wiring(&bad)
        else {
            panic!("expected invalid wiring");
        };
        assert_eq!(process, "onboard");
        assert_eq!(problems.len(), 3);
        assert!(problems.contains(&WiringProblem::UnknownKind {
            step: "archive".into(),
            kind: ServiceKind::new("archive-asset").unwrap(),
        }));
        assert!(problems.contains(&WiringProblem::UnknownGuard {
            step: "verify".into(),
            kind: ServiceKind::new("verify-asset").unwrap(),
            guard: guard("no-owner"),
        }));
        assert!(problems.contains(&WiringProblem::UndefinedStep { step: "publish".into() }));
    }
}
