//! Guard-driven governance action services.
//!
//! A governance action service inspects metadata elements and reports a
//! completion status plus a set of named guards that an external orchestrator
//! routes on. This crate bundles the building blocks behind feature flags:
//! primitives (guard catalogs, targets, descriptors), decision engines, the
//! invocation kernel, configuration, and tracing helpers.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use action_primitives as primitives;

/// Provider registry and invocation kernel (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use action_kernel as kernel;

/// Decision engines and the completion contract (enabled by `policy` feature).
#[cfg(feature = "policy")]
pub use action_policy as policy;

/// Tracing setup and spans (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use action_telemetry as telemetry;

/// Configuration management (enabled by `config` feature).
#[cfg(feature = "config")]
pub use action_config as config;
