//! Configuration management for governance action services.
//!
//! Two kinds of configuration exist: deployment-wide settings for the
//! invocation kernel ([`KernelConfig`]) and the opaque key/value map an
//! orchestrator hands to each invocation ([`RequestParameters`]).

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod parameters;
pub mod schema;

mod error;

pub use error::{ConfigError, ConfigResult};
pub use parameters::RequestParameters;
pub use schema::KernelConfig;
