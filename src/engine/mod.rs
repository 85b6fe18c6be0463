//! Scheduling engine: decomposes expressions into work items, hands them out,
//! and aggregates completions.

pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{Orchestrator, ReportOutcome};
pub use scheduler::Scheduler;
