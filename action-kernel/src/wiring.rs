//! Process definitions checked against the provider registry before execution.

use std::collections::BTreeMap;

use action_primitives::{GuardName, ServiceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A guard-labelled edge between two process steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    from_step: String,
    guard: GuardName,
    to_step: String,
}

impl Transition {
    /// Creates a transition taken when `from_step` emits `guard`.
    #[must_use]
    pub fn new(from_step: impl Into<String>, guard: GuardName, to_step: impl Into<String>) -> Self {
        Self {
            from_step: from_step.into(),
            guard,
            to_step: to_step.into(),
        }
    }

    /// Returns the step whose guard triggers the transition.
    #[must_use]
    pub fn from_step(&self) -> &str {
        &self.from_step
    }

    /// Returns the triggering guard.
    #[must_use]
    pub fn guard(&self) -> &GuardName {
        &self.guard
    }

    /// Returns the step started by the transition.
    #[must_use]
    pub fn to_step(&self) -> &str {
        &self.to_step
    }
}

/// Static shape of a governance action process: named steps bound to service
/// kinds, and the transitions between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessWiring {
    name: String,
    #[serde(default)]
    steps: BTreeMap<String, ServiceKind>,
    #[serde(default)]
    transitions: Vec<Transition>,
}

impl ProcessWiring {
    /// Creates an empty process definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: BTreeMap::new(),
            transitions: Vec::new(),
        }
    }

    /// Binds a step name to a service kind, replacing any earlier binding.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>, kind: ServiceKind) -> Self {
        self.steps.insert(step.into(), kind);
        self
    }

    /// Adds a transition.
    #[must_use]
    pub fn with_transition(
        mut self,
        from_step: impl Into<String>,
        guard: GuardName,
        to_step: impl Into<String>,
    ) -> Self {
        self.transitions.push(Transition::new(from_step, guard, to_step));
        self
    }

    /// Returns the process name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service kind bound to a step.
    #[must_use]
    pub fn step_kind(&self, step: &str) -> Option<&ServiceKind> {
        self.steps.get(step)
    }

    /// Iterates over `(step, kind)` bindings in step-name order.
    pub fn steps(&self) -> impl Iterator<Item = (&str, &ServiceKind)> {
        self.steps.iter().map(|(step, kind)| (step.as_str(), kind))
    }

    /// Returns the declared transitions.
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

/// One authoring error found while validating a [`ProcessWiring`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringProblem {
    /// A transition names a step the process does not define.
    #[error("transition references undefined step `{step}`")]
    UndefinedStep {
        /// Missing step name.
        step: String,
    },
    /// A step is bound to a kind nobody registered.
    #[error("step `{step}` uses unregistered kind `{kind}`")]
    UnknownKind {
        /// Step name.
        step: String,
        /// Unregistered kind.
        kind: ServiceKind,
    },
    /// A transition is keyed on a guard the source kind never produces.
    #[error("step `{step}` ({kind}) never produces guard `{guard}`")]
    UnknownGuard {
        /// Source step name.
        step: String,
        /// Kind bound to the source step.
        kind: ServiceKind,
        /// Guard named by the transition.
        guard: GuardName,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_json() {
        let wiring: ProcessWiring = serde_json::from_value(serde_json::json!({
            "name": "onboard-asset",
            "steps": { "verify": "verify-asset", "quarantine": "quarantine-asset" },
            "transitions": [
                { "fromStep": "verify", "guard": "no-origin", "toStep": "quarantine" }
            ]
        }))
        .unwrap();

        assert_eq!(wiring.name(), "onboard-asset");
        assert_eq!(wiring.step_kind("verify").unwrap().as_str(), "verify-asset");
        assert_eq!(wiring.transitions().len(), 1);
        assert_eq!(wiring.transitions()[0].guard().as_str(), "no-origin");
    }

    #[test]
    fn rejects_malformed_guard_names() {
        let result: Result<ProcessWiring, _> = serde_json::from_value(serde_json::json!({
            "name": "bad",
            "transitions": [{ "fromStep": "a", "guard": "No Origin", "toStep": "b" }]
        }));
        assert!(result.is_err());
    }
}
