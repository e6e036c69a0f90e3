//! Guard vocabulary declared by governance action service kinds.
//!
//! A guard is a named token emitted alongside a [`CompletionStatus`]. The
//! orchestrator uses guards to select the next step of a governance action
//! process, so a kind's guards are published up front in a [`GuardCatalog`]
//! and every emitted guard must come from that catalog.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::CompletionStatus;
use crate::error::{Error, Result};

const MAX_GUARD_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 512;

/// Name of a guard, unique within the catalog of one service kind.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuardName(String);

impl GuardName {
    /// Creates a guard name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if the name is empty, too long, or
    /// contains characters other than lowercase ASCII alphanumerics and `-`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_guard_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the guard name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GuardName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for GuardName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GuardName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<GuardName> for String {
    fn from(value: GuardName) -> Self {
        value.0
    }
}

impl PartialEq<str> for GuardName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for GuardName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn validate_guard_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::identifier("", "guard name cannot be empty"));
    }

    if name.len() > MAX_GUARD_LEN {
        return Err(Error::identifier(
            name,
            format!("guard name length must be <= {MAX_GUARD_LEN}"),
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::identifier(
            name,
            "guard name cannot start or end with a dash",
        ));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-'))
    {
        return Err(Error::identifier(
            name,
            "guard name must contain lowercase alphanumerics or dashes",
        ));
    }

    Ok(())
}

/// A closed, compile-time guard vocabulary.
///
/// Engines declare their guards as an enum implementing this trait and build
/// their catalog with [`GuardCatalog::from_tokens`]. Emitting a variant of that
/// enum can then never produce a guard outside the declared catalog.
pub trait GuardToken: Copy + Eq + 'static {
    /// Every variant of the vocabulary, in catalog order.
    fn all() -> &'static [Self];

    /// Published guard name. Must never change once released.
    fn name(self) -> &'static str;

    /// Human-readable description of what the guard signals.
    fn description(self) -> &'static str;

    /// Completion status most often reported alongside this guard.
    fn typical_completion_status(self) -> CompletionStatus;

    /// Returns the token as a [`GuardName`].
    ///
    /// The name is not re-validated here; [`GuardCatalog::from_tokens`] rejects
    /// malformed vocabularies when the catalog is built.
    fn guard_name(self) -> GuardName {
        GuardName(self.name().to_owned())
    }
}

/// Declared member of a guard catalog.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GuardType {
    name: GuardName,
    typical_completion_status: CompletionStatus,
    description: String,
}

impl GuardType {
    /// Creates a guard declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if the description is empty or exceeds
    /// the maximum supported length.
    pub fn new(
        name: GuardName,
        typical_completion_status: CompletionStatus,
        description: impl Into<String>,
    ) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(Error::InvalidCatalog {
                reason: format!("guard `{name}` must have a description"),
            });
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(Error::InvalidCatalog {
                reason: format!(
                    "description of guard `{name}` must be <= {MAX_DESCRIPTION_LEN} bytes"
                ),
            });
        }

        Ok(Self {
            name,
            typical_completion_status,
            description,
        })
    }

    /// Builds a declaration from a closed-vocabulary token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token's name or description is malformed.
    pub fn from_token<G: GuardToken>(token: G) -> Result<Self> {
        Self::new(
            GuardName::new(token.name())?,
            token.typical_completion_status(),
            token.description(),
        )
    }

    /// Returns the guard name.
    #[must_use]
    pub fn name(&self) -> &GuardName {
        &self.name
    }

    /// Returns the completion status typically paired with the guard.
    ///
    /// Advisory only; it is not enforced when the guard is emitted.
    #[must_use]
    pub const fn typical_completion_status(&self) -> CompletionStatus {
        self.typical_completion_status
    }

    /// Returns the guard description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Full set of guards a service kind can ever emit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GuardCatalog {
    guards: Vec<GuardType>,
}

impl GuardCatalog {
    /// Starts building a catalog.
    #[must_use]
    pub fn builder() -> GuardCatalogBuilder {
        GuardCatalogBuilder {
            guards: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Builds the catalog for a closed guard vocabulary.
    ///
    /// # Errors
    ///
    /// Returns an error if any token is malformed, names collide, or the
    /// vocabulary is empty.
    pub fn from_tokens<G: GuardToken>() -> Result<Self> {
        G::all()
            .iter()
            .try_fold(Self::builder(), |builder, token| {
                builder.add(GuardType::from_token(*token)?)
            })?
            .build()
    }

    /// Returns `true` when the catalog declares the named guard.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the declaration for the named guard.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GuardType> {
        self.guards.iter().find(|guard| guard.name.as_str() == name)
    }

    /// Returns the declared guards in publication order.
    pub fn iter(&self) -> impl Iterator<Item = &GuardType> {
        self.guards.iter()
    }

    /// Returns the declared guard names in publication order.
    pub fn names(&self) -> impl Iterator<Item = &GuardName> {
        self.guards.iter().map(GuardType::name)
    }

    /// Returns the first supplied guard that the catalog does not declare.
    pub fn first_undeclared<'a, I>(&self, guards: I) -> Option<&'a GuardName>
    where
        I: IntoIterator<Item = &'a GuardName>,
    {
        guards
            .into_iter()
            .find(|guard| !self.contains(guard.as_str()))
    }

    /// Returns the number of declared guards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Returns `true` if the catalog declares no guards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// Builder for [`GuardCatalog`].
#[derive(Debug)]
pub struct GuardCatalogBuilder {
    guards: Vec<GuardType>,
    seen: BTreeSet<GuardName>,
}

impl GuardCatalogBuilder {
    /// Adds a guard declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if a guard with the same name was
    /// already added.
    pub fn add(mut self, guard: GuardType) -> Result<Self> {
        if !self.seen.insert(guard.name.clone()) {
            return Err(Error::InvalidCatalog {
                reason: format!("guard `{}` declared more than once", guard.name),
            });
        }
        self.guards.push(guard);
        Ok(self)
    }

    /// Finalises the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if no guards were declared.
    pub fn build(self) -> Result<GuardCatalog> {
        if self.guards.is_empty() {
            return Err(Error::InvalidCatalog {
                reason: "at least one guard must be declared".into(),
            });
        }
        Ok(GuardCatalog {
            guards: self.guards,
        })
    }
}
