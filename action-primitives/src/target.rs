//! Action targets supplied to an invocation and their progress tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::{CompletionStatus, ElementGuid, TargetEvent, TargetStatus};

/// Reference to a metadata element owned by an external repository.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    guid: ElementGuid,
    type_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    super_types: Vec<String>,
}

impl ElementRef {
    /// Creates a reference to an element of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] when the type name is empty.
    pub fn new(guid: ElementGuid, type_name: impl Into<String>) -> Result<Self> {
        let type_name = type_name.into();
        if type_name.trim().is_empty() {
            return Err(Error::InvalidTarget {
                reason: "element type name cannot be empty".into(),
            });
        }
        Ok(Self {
            guid,
            type_name,
            super_types: Vec::new(),
        })
    }

    /// Records the element's super types, ignoring blank entries.
    #[must_use]
    pub fn with_super_types<I, S>(mut self, super_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for super_type in super_types {
            let super_type = super_type.into();
            if !super_type.trim().is_empty() && !self.super_types.contains(&super_type) {
                self.super_types.push(super_type);
            }
        }
        self
    }

    /// Returns the element GUID.
    #[must_use]
    pub const fn guid(&self) -> ElementGuid {
        self.guid
    }

    /// Returns the element's own type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the element's super types, nearest first.
    #[must_use]
    pub fn super_types(&self) -> &[String] {
        &self.super_types
    }

    /// Returns `true` when the element is of `type_name` or inherits from it.
    #[must_use]
    pub fn is_of_type(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.super_types.iter().any(|t| t == type_name)
    }
}

/// One metadata element an invocation must process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    name: String,
    element: ElementRef,
    status: TargetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_time: Option<DateTime<Utc>>,
}

impl ActionTarget {
    /// Creates a waiting target with the supplied role name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] when the role name is empty.
    pub fn new(name: impl Into<String>, element: ElementRef) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidTarget {
                reason: "action target name cannot be empty".into(),
            });
        }
        Ok(Self {
            name,
            element,
            status: TargetStatus::Waiting,
            start_time: None,
            completion_time: None,
        })
    }

    /// Returns the role name (not unique within a set).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the referenced element.
    #[must_use]
    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    /// Returns the current progress status.
    #[must_use]
    pub const fn status(&self) -> TargetStatus {
        self.status
    }

    /// Returns when inspection of the target started.
    #[must_use]
    pub const fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// Returns when the target reached a terminal status.
    #[must_use]
    pub const fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.completion_time
    }

    /// Applies a lifecycle event at the given instant.
    ///
    /// The completion time is never recorded earlier than the start time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when `event` is not permitted from
    /// the current status; the target is left untouched.
    pub fn transition(&mut self, event: TargetEvent, at: DateTime<Utc>) -> Result<TargetStatus> {
        let Some(next) = self.status.next(event) else {
            let to = match event {
                TargetEvent::Begin => TargetStatus::InProgress,
                TargetEvent::Complete(status) => status.target_status(),
                TargetEvent::Cancel => TargetStatus::Cancelled,
            };
            return Err(Error::InvalidTransition {
                target: self.name.clone(),
                from: self.status,
                to,
            });
        };

        if next == TargetStatus::InProgress {
            self.start_time = Some(at);
        } else if next.is_terminal() {
            let at = self.start_time.map_or(at, |start| start.max(at));
            self.completion_time = Some(at);
        }

        debug!(
            target_name = %self.name,
            element = %self.element.guid,
            from = ?self.status,
            to = ?next,
            "action target transition"
        );
        self.status = next;
        Ok(next)
    }

    /// Marks the target as being inspected, if it is still waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when the target already reached a
    /// terminal status.
    pub fn begin(&mut self, at: DateTime<Utc>) -> Result<()> {
        match self.status {
            TargetStatus::InProgress => Ok(()),
            _ => self.transition(TargetEvent::Begin, at).map(|_| ()),
        }
    }

    /// Drives a non-terminal target to the status matching `completion`.
    ///
    /// Waiting targets pass through `InProgress` first. Terminal targets keep
    /// their status.
    pub fn settle(&mut self, completion: CompletionStatus, at: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        // Waiting -> InProgress -> terminal are always legal.
        if self.status == TargetStatus::Waiting {
            let begun = self.transition(TargetEvent::Begin, at);
            debug_assert!(begun.is_ok(), "waiting target rejected Begin: {begun:?}");
        }
        let settled = self.transition(TargetEvent::Complete(completion), at);
        debug_assert!(settled.is_ok(), "in-progress target rejected Complete: {settled:?}");
    }

    /// Cancels the target if it has not reached a terminal status.
    pub fn cancel(&mut self, at: DateTime<Utc>) {
        if !self.status.is_terminal() {
            let cancelled = self.transition(TargetEvent::Cancel, at);
            debug_assert!(cancelled.is_ok(), "live target rejected Cancel: {cancelled:?}");
        }
    }
}

/// Number of targets supplied to an invocation, bucketed for policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCardinality {
    /// No targets.
    Zero,
    /// Exactly one target.
    One,
    /// Two or more targets.
    Many,
}

impl TargetCardinality {
    /// Buckets a target count.
    #[must_use]
    pub const fn of(count: usize) -> Self {
        match count {
            0 => Self::Zero,
            1 => Self::One,
            _ => Self::Many,
        }
    }
}

/// Target cardinalities a service kind declares it can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupportedCardinalities {
    zero: bool,
    one: bool,
    many: bool,
}

impl SupportedCardinalities {
    /// Exactly one target per invocation.
    #[must_use]
    pub const fn single_only() -> Self {
        Self {
            zero: false,
            one: true,
            many: false,
        }
    }

    /// One or more targets, evaluated by fan-out.
    #[must_use]
    pub const fn at_least_one() -> Self {
        Self {
            zero: false,
            one: true,
            many: true,
        }
    }

    /// Any number of targets, including none.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            zero: true,
            one: true,
            many: true,
        }
    }

    /// Builds an explicit combination.
    #[must_use]
    pub const fn new(zero: bool, one: bool, many: bool) -> Self {
        Self { zero, one, many }
    }

    /// Returns `true` when the cardinality is supported.
    #[must_use]
    pub const fn allows(self, cardinality: TargetCardinality) -> bool {
        match cardinality {
            TargetCardinality::Zero => self.zero,
            TargetCardinality::One => self.one,
            TargetCardinality::Many => self.many,
        }
    }

    /// Returns `true` when no cardinality at all is supported.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        !(self.zero || self.one || self.many)
    }
}

impl Default for SupportedCardinalities {
    fn default() -> Self {
        Self::single_only()
    }
}

/// The collection of targets an invocation must process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionTargetSet {
    targets: Vec<ActionTarget>,
}

impl ActionTargetSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target.
    pub fn push(&mut self, target: ActionTarget) {
        self.targets.push(target);
    }

    /// Appends a target and returns the updated set.
    #[must_use]
    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.push(target);
        self
    }

    /// Returns the number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` when no targets were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns the cardinality bucket of the set.
    #[must_use]
    pub fn cardinality(&self) -> TargetCardinality {
        TargetCardinality::of(self.targets.len())
    }

    /// Returns the only target, if the set holds exactly one.
    #[must_use]
    pub fn single(&self) -> Option<&ActionTarget> {
        match self.targets.as_slice() {
            [target] => Some(target),
            _ => None,
        }
    }

    /// Mutable variant of [`Self::single`].
    pub fn single_mut(&mut self) -> Option<&mut ActionTarget> {
        match self.targets.as_mut_slice() {
            [target] => Some(target),
            _ => None,
        }
    }

    /// Iterates over the targets.
    pub fn iter(&self) -> std::slice::Iter<'_, ActionTarget> {
        self.targets.iter()
    }

    /// Iterates mutably over the targets.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ActionTarget> {
        self.targets.iter_mut()
    }

    /// Settles every non-terminal target to the invocation's completion status.
    pub fn settle(&mut self, completion: CompletionStatus, at: DateTime<Utc>) {
        for target in &mut self.targets {
            target.settle(completion, at);
        }
    }

    /// Cancels every non-terminal target.
    pub fn cancel(&mut self, at: DateTime<Utc>) {
        for target in &mut self.targets {
            target.cancel(at);
        }
    }

    /// Returns `true` once every target reached a terminal status.
    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.targets.iter().all(|t| t.status().is_terminal())
    }
}

impl From<Vec<ActionTarget>> for ActionTargetSet {
    fn from(targets: Vec<ActionTarget>) -> Self {
        Self { targets }
    }
}

impl FromIterator<ActionTarget> for ActionTargetSet {
    fn from_iter<I: IntoIterator<Item = ActionTarget>>(iter: I) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ActionTargetSet {
    type Item = &'a ActionTarget;
    type IntoIter = std::slice::Iter<'a, ActionTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}
