//! Integration tests for telemetry initialization and span helpers.

use distcalc::expr::Operator;
use distcalc::model::{ExpressionId, WorkId, WorkState};
use distcalc::telemetry::{TelemetryConfig, init_telemetry, metrics, work};

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = TelemetryConfig {
        log_level: "distcalc=debug".to_string(),
        ..TelemetryConfig::new("distcalc-test")
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = init_telemetry(config);
}

#[test]
fn work_span_records_item_and_transitions() {
    let span = work::start_work_span("report", WorkId::new());
    work::record_work_item(&span, Operator::Divide, Some(ExpressionId::new()));
    work::record_state_transition(&span, WorkState::Pending, WorkState::Claimed);
    work::record_state_transition(&span, WorkState::Claimed, WorkState::Done);
}

#[test]
fn metric_instruments_build_without_provider() {
    use opentelemetry::KeyValue;

    metrics::expressions_submitted().add(1, &[KeyValue::new("result", "scheduled")]);
    metrics::expressions_resolved().add(1, &[KeyValue::new("status", "done")]);
    metrics::work_items_scheduled().add(2, &[]);
    metrics::work_claims().add(1, &[KeyValue::new("result", "empty")]);
    metrics::work_reports().add(1, &[KeyValue::new("result", "ok")]);
    metrics::operation_duration_ms().record(12.5, &[KeyValue::new("operation", "compute")]);
}

/// Requires an OTLP collector on localhost:4317.
#[tokio::test]
#[ignore]
async fn smoke_export_to_collector() {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: Some("http://localhost:4317".to_string()),
        ..TelemetryConfig::new("distcalc-smoke-test")
    })
    .expect("failed to init telemetry");

    {
        let span = work::start_work_span("smoke", WorkId::new());
        let _enter = span.enter();
        work::record_state_transition(&span, WorkState::Pending, WorkState::Claimed);
        tracing::info!("smoke log line");
    }
    metrics::work_claims().add(1, &[opentelemetry::KeyValue::new("result", "claimed")]);

    guard.force_flush();
}
