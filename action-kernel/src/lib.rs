//! Invocation kernel for governance action services.
//!
//! The kernel owns a [`ProviderRegistry`] of service kinds, validates process
//! wiring against their guard catalogs before anything runs, and dispatches
//! invocations to decision engines on a bounded [`TaskScheduler`]. Every
//! invocation ends in an [`InvocationReport`] whose [`Verdict`] separates
//! domain outcomes from infrastructure faults and from engines that broke the
//! completion contract.

#![warn(missing_docs, clippy::pedantic)]

mod invocation;
mod registry;
mod scheduler;
mod wiring;

pub use invocation::{
    ActionKernel, InvocationHandle, InvocationReport, KernelError, KernelResult, Verdict,
};
pub use registry::{ProviderRegistry, RegistryError, RegistryResult};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
pub use wiring::{ProcessWiring, Transition, WiringProblem};
