//! # distcalc
//!
//! Distributed arithmetic evaluation.
//!
//! An expression is parsed into a tree of binary operations. Operations whose
//! operands are both literals become work items in a durable store; worker
//! agents pull them one at a time, simulate the operator's latency, and
//! report back. Once nothing is outstanding the orchestrator evaluates the
//! whole tree and records the final value.

pub mod agent;
pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod expr;
pub mod model;
pub mod telemetry;
