//! Work item span helpers.
//!
//! Provides span creation and state-transition recording for work items
//! moving through pull, compute, and report.

use tracing::Span;

use crate::expr::Operator;
use crate::model::{ExpressionId, WorkId, WorkState};

/// Start a span for one step of a work item's lifecycle.
///
/// The `work.state` and `work.expression_id` fields are declared empty and
/// filled in as the item is loaded and transitioned.
pub fn start_work_span(step: &'static str, work_id: WorkId) -> Span {
    tracing::info_span!(
        "work",
        "work.step" = step,
        "work.id" = %work_id,
        "work.operator" = tracing::field::Empty,
        "work.expression_id" = tracing::field::Empty,
        "work.state" = tracing::field::Empty,
    )
}

/// Record the span's operation and, when known, its expression.
pub fn record_work_item(span: &Span, operator: Operator, expression_id: Option<ExpressionId>) {
    span.record("work.operator", tracing::field::display(operator));
    if let Some(expression_id) = expression_id {
        span.record("work.expression_id", tracing::field::display(expression_id));
    }
}

/// Record a state transition event on the given span.
///
/// Updates `work.state` and emits a tracing `info` event scoped to the span.
pub fn record_state_transition(span: &Span, from: WorkState, to: WorkState) {
    span.record("work.state", tracing::field::display(to));
    span.in_scope(|| {
        tracing::info!(from = %from, to = %to, "state_transition");
    });
}
