//! Read-only access to target element state held by an external repository.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use action_primitives::{ElementGuid, ElementRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors surfaced by element accessors.
#[derive(Debug, Error)]
pub enum AccessorError {
    /// The element does not exist or is not visible to the caller.
    #[error("element {guid} not found")]
    NotFound {
        /// Requested element.
        guid: ElementGuid,
    },
    /// The backing repository failed.
    #[error("element accessor backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
}

impl AccessorError {
    /// Convenience helper to construct backend errors.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result alias for accessor operations.
pub type AccessorResult<T> = Result<T, AccessorError>;

/// Snapshot of an element's type, classifications, and properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    element: ElementRef,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    classifications: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    properties: Map<String, Value>,
}

impl ElementState {
    /// Creates an unclassified element snapshot.
    #[must_use]
    pub fn new(element: ElementRef) -> Self {
        Self {
            element,
            classifications: BTreeSet::new(),
            properties: Map::new(),
        }
    }

    /// Adds a classification, ignoring blank names.
    #[must_use]
    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        let classification = classification.into();
        if !classification.trim().is_empty() {
            self.classifications.insert(classification);
        }
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the element reference, including its type hierarchy.
    #[must_use]
    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    /// Returns the classification names attached to the element.
    #[must_use]
    pub fn classifications(&self) -> &BTreeSet<String> {
        &self.classifications
    }

    /// Returns `true` when the element carries the classification.
    #[must_use]
    pub fn has_classification(&self, name: &str) -> bool {
        self.classifications.contains(name)
    }

    /// Returns the element properties.
    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

/// Read-only accessor through which engines inspect target elements.
///
/// The query protocol behind it (caching, federation, query language) is the
/// implementer's concern.
#[async_trait]
pub trait ElementAccessor: Send + Sync {
    /// Fetches the current state of an element.
    async fn element(&self, guid: ElementGuid) -> AccessorResult<ElementState>;
}

/// Accessor backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryElementStore {
    elements: RwLock<HashMap<ElementGuid, ElementState>>,
}

impl InMemoryElementStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an element snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::Backend`] if the store lock has been poisoned.
    pub fn upsert(&self, state: ElementState) -> AccessorResult<()> {
        let mut elements = self
            .elements
            .write()
            .map_err(|_| AccessorError::backend("element store poisoned"))?;
        elements.insert(state.element().guid(), state);
        Ok(())
    }

    /// Removes an element.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::Backend`] if the store lock has been poisoned.
    pub fn remove(&self, guid: ElementGuid) -> AccessorResult<Option<ElementState>> {
        let mut elements = self
            .elements
            .write()
            .map_err(|_| AccessorError::backend("element store poisoned"))?;
        Ok(elements.remove(&guid))
    }
}

#[async_trait]
impl ElementAccessor for InMemoryElementStore {
    async fn element(&self, guid: ElementGuid) -> AccessorResult<ElementState> {
        let elements = self
            .elements
            .read()
            .map_err(|_| AccessorError::backend("element store poisoned"))?;
        elements
            .get(&guid)
            .cloned()
            .ok_or(AccessorError::NotFound { guid })
    }
}
