//! Decision engines for governance action services.
//!
//! A [`DecisionEngine`](engine::DecisionEngine) evaluates the targets carried by
//! an [`ActionContext`](contracts::ActionContext) and reports its result through
//! [`ActionContext::record_completion`](contracts::ActionContext::record_completion)
//! exactly once. Domain outcomes travel only through that callback; errors are
//! reserved for infrastructure faults.

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod decision;
pub mod dimensions;
pub mod engine;
pub mod integrations;
pub mod verification;
