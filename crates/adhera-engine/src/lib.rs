//! Decision engine and batch orchestration.
//!
//! [`DecisionEngine`] answers one classification request against the
//! knowledge base; [`BatchOrchestrator`] runs a whole table of them with a
//! shared [`VerdictCache`], a concurrency ceiling, retries for transient
//! provider failures, and cooperative cancellation.

pub mod cache;
pub mod decision;
pub mod error;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheEntry, CacheError, VerdictCache};
pub use decision::DecisionEngine;
pub use error::EngineError;
pub use orchestrator::{BatchOrchestrator, BatchReport, CancelHandle};
