//! Metric instrument factories for distcalc.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"distcalc"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for distcalc instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("distcalc")
}

/// Counter: expressions submitted.
/// Labels: `result` ("scheduled" | "literal" | "rejected" | "error").
pub fn expressions_submitted() -> Counter<u64> {
    meter()
        .u64_counter("distcalc.expressions.submitted")
        .with_description("Number of expressions submitted")
        .build()
}

/// Counter: expressions that left pending.
/// Labels: `status` ("done" | "error").
pub fn expressions_resolved() -> Counter<u64> {
    meter()
        .u64_counter("distcalc.expressions.resolved")
        .with_description("Number of expressions resolved by aggregation")
        .build()
}

/// Counter: work items actually inserted by a scheduling pass.
pub fn work_items_scheduled() -> Counter<u64> {
    meter()
        .u64_counter("distcalc.work.scheduled")
        .with_description("Number of work items scheduled")
        .build()
}

/// Counter: pull attempts.
/// Labels: `result` ("claimed" | "empty" | "error").
pub fn work_claims() -> Counter<u64> {
    meter()
        .u64_counter("distcalc.work.claims")
        .with_description("Number of work pulls")
        .build()
}

/// Counter: result reports.
/// Labels: `result` ("ok" | "not_found" | "conflict" | "error").
pub fn work_reports() -> Counter<u64> {
    meter()
        .u64_counter("distcalc.work.reports")
        .with_description("Number of work result reports")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("distcalc.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
