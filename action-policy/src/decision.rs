//! Outcome types emitted by decision engines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use action_primitives::{CompletionStatus, GuardName, GuardToken};

/// The completion status, guards, and output properties of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    status: CompletionStatus,
    guards: Vec<GuardName>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    output: Map<String, Value>,
}

impl ActionOutcome {
    /// Creates an outcome. Repeated guards are kept once, in first-seen order.
    #[must_use]
    pub fn new<I>(status: CompletionStatus, guards: I) -> Self
    where
        I: IntoIterator<Item = GuardName>,
    {
        let mut ordered: Vec<GuardName> = Vec::new();
        for guard in guards {
            if !ordered.contains(&guard) {
                ordered.push(guard);
            }
        }
        Self {
            status,
            guards: ordered,
            output: Map::new(),
        }
    }

    /// Creates an outcome from closed-vocabulary guard tokens.
    #[must_use]
    pub fn from_tokens<G, I>(status: CompletionStatus, tokens: I) -> Self
    where
        G: GuardToken,
        I: IntoIterator<Item = G>,
    {
        Self::new(status, tokens.into_iter().map(GuardToken::guard_name))
    }

    /// Creates an outcome carrying a single guard.
    #[must_use]
    pub fn single<G: GuardToken>(status: CompletionStatus, token: G) -> Self {
        Self::from_tokens(status, [token])
    }

    /// Attaches a free-form output property.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    /// Returns the completion status.
    #[must_use]
    pub const fn status(&self) -> CompletionStatus {
        self.status
    }

    /// Returns the emitted guards in emission order.
    #[must_use]
    pub fn guards(&self) -> &[GuardName] {
        &self.guards
    }

    /// Returns `true` when the named guard was emitted.
    #[must_use]
    pub fn has_guard(&self, name: &str) -> bool {
        self.guards.iter().any(|guard| guard.as_str() == name)
    }

    /// Returns the output properties.
    #[must_use]
    pub fn output(&self) -> &Map<String, Value> {
        &self.output
    }
}
