//! Core primitives shared by governance action services.
//!
//! A governance action service evaluates a set of [`ActionTarget`]s and reports
//! exactly one [`CompletionStatus`] together with guards drawn from the
//! [`GuardCatalog`] its [`ProviderDescriptor`] publishes.

#![warn(missing_docs, clippy::pedantic)]

mod completion;
mod descriptor;
mod error;
mod guard;
mod ids;
mod lifecycle;
mod target;

/// Completion status reported by every invocation.
pub use completion::CompletionStatus;
/// Static self-description of a service kind.
pub use descriptor::{
    ActionTargetType, ConnectorIdentity, ProviderDescriptor, ProviderDescriptorBuilder,
    RequestParameterType, ServiceKind,
};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Guard vocabulary types.
pub use guard::{GuardCatalog, GuardCatalogBuilder, GuardName, GuardToken, GuardType};
/// Identifiers for elements and invocations.
pub use ids::{ElementGuid, InvocationId};
/// Per-target lifecycle.
pub use lifecycle::{TargetEvent, TargetStatus};
/// Action targets and cardinality policy.
pub use target::{
    ActionTarget, ActionTargetSet, ElementRef, SupportedCardinalities, TargetCardinality,
};
