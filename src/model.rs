//! Core data model.
//!
//! An expression is a user-submitted calculation. A work item is one binary
//! operation of that expression, dispatched to a worker. Both carry a
//! lifecycle state that only the store mutates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::expr::Operator;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Newtype for expression IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpressionId(pub Uuid);

/// Newtype for work item IDs.
///
/// UUIDv7: a millisecond timestamp followed by random bits, so IDs minted by
/// concurrent scheduling passes do not collide and sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkId(pub Uuid);

macro_rules! uuid_newtype {
    ($name:ident) => {
        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| Error::Other(format!("invalid id {s:?}: {e}")))
            }
        }
    };
}

uuid_newtype!(ExpressionId);
uuid_newtype!(WorkId);

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// A user-submitted calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: ExpressionId,
    /// Who submitted it. Reads are scoped to this owner.
    pub owner_id: String,
    /// The text exactly as submitted. Re-parsed on every scheduling pass.
    pub text: String,
    pub status: ExpressionStatus,
    /// Final value, present once `status` is `Done`.
    pub result: Option<f64>,
    /// Failure reason, present once `status` is `Error`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expression {
    /// A new expression waiting on its work items.
    pub fn pending(owner_id: impl Into<String>, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ExpressionId::new(),
            owner_id: owner_id.into(),
            text: text.into(),
            status: ExpressionStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A new expression whose value is already known.
    pub fn resolved(owner_id: impl Into<String>, text: impl Into<String>, value: f64) -> Self {
        Self {
            status: ExpressionStatus::Done,
            result: Some(value),
            ..Self::pending(owner_id, text)
        }
    }
}

/// Lifecycle state of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionStatus {
    /// Work items are outstanding.
    Pending,
    /// Fully evaluated. Terminal.
    Done,
    /// Parsing or evaluation failed at a checkpoint. Terminal.
    Error,
}

impl ExpressionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExpressionStatus::Pending)
    }
}

impl std::fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExpressionStatus::Pending => "pending",
            ExpressionStatus::Done => "done",
            ExpressionStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExpressionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExpressionStatus::Pending),
            "done" => Ok(ExpressionStatus::Done),
            "error" => Ok(ExpressionStatus::Error),
            _ => Err(Error::Other(format!("unknown expression status: {s}"))),
        }
    }
}

/// How an expression left `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Done(f64),
    Error(String),
}

impl Resolution {
    pub fn status(&self) -> ExpressionStatus {
        match self {
            Resolution::Done(_) => ExpressionStatus::Done,
            Resolution::Error(_) => ExpressionStatus::Error,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Resolution::Done(value) => Some(*value),
            Resolution::Error(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Resolution::Done(_) => None,
            Resolution::Error(reason) => Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// One binary operation of an expression, dispatchable to a worker.
///
/// `(expression_id, operand1, operand2, operator)` is unique in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkId,
    pub expression_id: ExpressionId,
    pub operand1: f64,
    pub operand2: f64,
    pub operator: Operator,
    /// Simulated compute latency the worker sleeps for.
    pub operation_time_ms: u64,
    pub state: WorkState,
    /// Value reported by the worker. Kept for audit; the expression's final
    /// value never comes from here.
    pub result: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn pending(
        expression_id: ExpressionId,
        operand1: f64,
        operand2: f64,
        operator: Operator,
        operation_time: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkId::new(),
            expression_id,
            operand1,
            operand2,
            operator,
            operation_time_ms: u64::try_from(operation_time.as_millis()).unwrap_or(u64::MAX),
            state: WorkState::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn operation_time(&self) -> Duration {
        Duration::from_millis(self.operation_time_ms)
    }
}

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Waiting for a worker.
    Pending,
    /// Handed to exactly one worker.
    Claimed,
    /// Result reported. Terminal.
    Done,
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkState::Pending => "pending",
            WorkState::Claimed => "claimed",
            WorkState::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkState::Pending),
            "claimed" => Ok(WorkState::Claimed),
            "done" => Ok(WorkState::Done),
            _ => Err(Error::Other(format!("unknown work state: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// What a worker receives from a successful pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: WorkId,
    pub operand1: f64,
    pub operand2: f64,
    pub operator: Operator,
    pub operation_time_ms: u64,
}

impl Task {
    pub fn operation_time(&self) -> Duration {
        Duration::from_millis(self.operation_time_ms)
    }
}

impl From<&WorkItem> for Task {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id,
            operand1: item.operand1,
            operand2: item.operand2,
            operator: item.operator,
            operation_time_ms: item.operation_time_ms,
        }
    }
}

/// What a worker sends back after computing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: WorkId,
    pub result: f64,
}
