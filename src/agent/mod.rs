//! Worker agent: pulls tasks, simulates their latency, computes, reports.
//!
//! Workers hold no state between tasks. A failed report is not retried, and
//! a task whose operation fails (division by zero) is logged and never
//! reported.

pub mod client;

pub use client::OrchestratorClient;

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::expr::EvalError;
use crate::model::{TaskResult, WorkId};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_work_item, start_work_span};

/// What one pull-compute-report cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing was pending.
    Idle,
    /// The result was accepted by the orchestrator.
    Reported {
        id: WorkId,
        result: f64,
        remaining: u64,
    },
    /// The operation failed locally; nothing was reported.
    Skipped { id: WorkId, error: EvalError },
}

pub struct Agent {
    client: OrchestratorClient,
    config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let client = OrchestratorClient::new(&config.orchestrator_url)?;
        Ok(Self { client, config })
    }

    /// Pull one task and see it through.
    pub async fn run_once(&self) -> Result<Step> {
        let Some(task) = self.client.pull().await? else {
            debug!("no task available");
            return Ok(Step::Idle);
        };

        let span = start_work_span("compute", task.id);
        record_work_item(&span, task.operator, None);

        async {
            let started = Instant::now();
            tokio::time::sleep(task.operation_time()).await;

            let result = match task.operator.apply(task.operand1, task.operand2) {
                Ok(result) => result,
                Err(error) => {
                    warn!(
                        operand1 = task.operand1,
                        operand2 = task.operand2,
                        "task not computable: {error}"
                    );
                    return Ok(Step::Skipped { id: task.id, error });
                }
            };
            metrics::operation_duration_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                &[
                    KeyValue::new("operation", "compute"),
                    KeyValue::new("operator", task.operator.to_string()),
                ],
            );

            let ack = self
                .client
                .report(&TaskResult {
                    id: task.id,
                    result,
                })
                .await?;
            info!(
                result,
                expression_id = %ack.expression_id,
                remaining = ack.remaining,
                "task reported"
            );
            Ok(Step::Reported {
                id: task.id,
                result,
                remaining: ack.remaining,
            })
        }
        .instrument(span)
        .await
    }

    /// Run `computing_power` workers until `shutdown` resolves. Each worker
    /// finishes the task it holds before stopping.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<()> {
        let agent = Arc::new(self);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        for worker in 0..agent.config.computing_power {
            let agent = Arc::clone(&agent);
            let stop = stop_rx.clone();
            workers.spawn(
                async move { agent.work(stop).await }
                    .instrument(tracing::info_span!("worker", worker)),
            );
        }
        info!(
            workers = agent.config.computing_power,
            orchestrator = agent.client.base_url(),
            "agent started"
        );

        shutdown.await;
        info!("agent shutting down");
        let _ = stop_tx.send(true);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("worker task failed: {e}");
            }
        }
        Ok(())
    }

    async fn work(&self, mut stop: watch::Receiver<bool>) {
        while !*stop.borrow() {
            let idle = match self.run_once().await {
                Ok(Step::Idle) => true,
                Ok(_) => false,
                Err(e) => {
                    warn!("worker step failed: {e}");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }
    }
}
