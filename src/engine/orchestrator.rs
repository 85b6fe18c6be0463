//! Orchestrator: submission, the claim protocol, and completion aggregation.
//!
//! All expression and work item state lives in the store. The orchestrator
//! holds only the scheduler configuration and a claim guard.

use opentelemetry::KeyValue;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, warn};

use super::Scheduler;
use crate::config::OperationTimings;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::expr;
use crate::model::{
    Expression, ExpressionId, ExpressionStatus, Resolution, WorkId, WorkItem, WorkState,
};
use crate::telemetry::metrics;
use crate::telemetry::work::{record_state_transition, record_work_item, start_work_span};

/// What a successful report did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    /// The work item, now done.
    pub item: WorkItem,
    /// Work items of the same expression still outstanding.
    pub remaining: u64,
    /// Set when this report moved the expression out of pending.
    pub resolved: Option<ExpressionStatus>,
}

pub struct Orchestrator<S> {
    store: S,
    scheduler: Scheduler,
    claim_lock: Mutex<()>,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(store: S, timings: OperationTimings) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(timings),
            claim_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // -----------------------------------------------------------------------
    // Client-facing
    // -----------------------------------------------------------------------

    /// Accept an expression for evaluation.
    ///
    /// The text must parse and evaluate to a finite value; otherwise nothing
    /// is stored and the rejection is returned. A single literal is stored
    /// done. Anything else is stored pending together with its first work
    /// items.
    pub async fn submit(&self, owner_id: &str, text: &str) -> Result<Expression> {
        let outcome = self.admit(owner_id, text).await;

        let label = match &outcome {
            Ok(expression) if expression.status == ExpressionStatus::Done => "literal",
            Ok(_) => "scheduled",
            Err(e) if e.is_rejection() => "rejected",
            Err(_) => "error",
        };
        metrics::expressions_submitted().add(1, &[KeyValue::new("result", label)]);

        match &outcome {
            Ok(expression) => info!(
                id = %expression.id,
                owner = owner_id,
                status = %expression.status,
                "expression submitted"
            ),
            Err(e) if e.is_rejection() => info!(owner = owner_id, "expression rejected: {e}"),
            Err(e) => error!(owner = owner_id, "submit failed: {e}"),
        }
        outcome
    }

    async fn admit(&self, owner_id: &str, text: &str) -> Result<Expression> {
        let mut tree = expr::parse(text)?;
        let value = expr::evaluate(&tree)?;
        if !value.is_finite() {
            return Err(Error::NonFinite(value));
        }

        if tree.is_leaf() {
            let expression = Expression::resolved(owner_id, text, value);
            self.store.create_expression(&expression, &[]).await?;
            return Ok(expression);
        }

        let expression = Expression::pending(owner_id, text);
        let items = self.scheduler.plan(expression.id, &mut tree);
        let inserted = self.store.create_expression(&expression, &items).await?;
        metrics::work_items_scheduled().add(inserted, &[]);
        debug!(id = %expression.id, inserted, "initial work items scheduled");
        Ok(expression)
    }

    /// Get an expression owned by `owner_id`. Another owner's expression is
    /// reported as not found.
    pub async fn get_expression(&self, id: ExpressionId, owner_id: &str) -> Result<Expression> {
        let expression = self.store.get_expression(id).await?;
        if expression.owner_id != owner_id {
            return Err(Error::NotFound(format!("expression {id}")));
        }
        Ok(expression)
    }

    pub async fn list_expressions(&self, owner_id: &str) -> Result<Vec<Expression>> {
        self.store.list_expressions(owner_id).await
    }

    // -----------------------------------------------------------------------
    // Worker-facing
    // -----------------------------------------------------------------------

    /// Claim one pending work item. `None` when there is nothing to do.
    pub async fn pull_work(&self) -> Result<Option<WorkItem>> {
        let claimed = {
            let _guard = self.claim_lock.lock().await;
            self.store.claim_next_work_item().await
        };

        match claimed {
            Ok(Some(item)) => {
                let span = start_work_span("pull", item.id);
                record_work_item(&span, item.operator, Some(item.expression_id));
                record_state_transition(&span, WorkState::Pending, WorkState::Claimed);
                metrics::work_claims().add(1, &[KeyValue::new("result", "claimed")]);
                Ok(Some(item))
            }
            Ok(None) => {
                debug!("no work available");
                metrics::work_claims().add(1, &[KeyValue::new("result", "empty")]);
                Ok(None)
            }
            Err(e) => {
                error!("claim failed: {e}");
                metrics::work_claims().add(1, &[KeyValue::new("result", "error")]);
                Err(e)
            }
        }
    }

    /// Record a worker's result for a claimed work item, schedule whatever
    /// became computable, and resolve the expression once nothing is
    /// outstanding.
    ///
    /// The reported value only gates progress. The expression's final value
    /// comes from evaluating its whole text.
    pub async fn report_result(&self, id: WorkId, result: f64) -> Result<ReportOutcome> {
        let span = start_work_span("report", id);
        let outcome = self.complete(id, result, &span).instrument(span.clone()).await;

        let label = match &outcome {
            Ok(_) => "ok",
            Err(Error::NotFound(_)) => "not_found",
            Err(Error::InvalidTransition { .. }) => "conflict",
            Err(_) => "error",
        };
        metrics::work_reports().add(1, &[KeyValue::new("result", label)]);

        if let Err(e) = &outcome {
            span.in_scope(|| match e {
                Error::NotFound(_) | Error::InvalidTransition { .. } => {
                    warn!("report rejected: {e}")
                }
                _ => error!("report failed: {e}"),
            });
        }
        outcome
    }

    async fn complete(
        &self,
        id: WorkId,
        result: f64,
        span: &tracing::Span,
    ) -> Result<ReportOutcome> {
        let item = self.store.complete_work_item(id, result).await?;
        record_work_item(span, item.operator, Some(item.expression_id));
        record_state_transition(span, WorkState::Claimed, WorkState::Done);

        let expression = self.store.get_expression(item.expression_id).await?;
        if expression.status.is_terminal() {
            let remaining = self.store.count_outstanding(expression.id).await?;
            debug!(status = %expression.status, "expression already resolved");
            return Ok(ReportOutcome {
                item,
                remaining,
                resolved: None,
            });
        }

        let mut tree = match expr::parse(&expression.text) {
            Ok(tree) => tree,
            Err(e) => {
                let resolved = self
                    .finalize(expression.id, Resolution::Error(e.to_string()))
                    .await?;
                let remaining = self.store.count_outstanding(expression.id).await?;
                return Ok(ReportOutcome {
                    item,
                    remaining,
                    resolved,
                });
            }
        };
        self.scheduler
            .schedule_ready(&self.store, expression.id, &mut tree)
            .await?;

        let remaining = self.store.count_outstanding(expression.id).await?;
        let resolved = if remaining == 0 {
            self.finalize(expression.id, aggregate(&expression.text))
                .await?
        } else {
            None
        };

        Ok(ReportOutcome {
            item,
            remaining,
            resolved,
        })
    }

    /// Move the expression out of pending. Returns the new status if this
    /// call made the transition, `None` if another report got there first.
    async fn finalize(
        &self,
        id: ExpressionId,
        resolution: Resolution,
    ) -> Result<Option<ExpressionStatus>> {
        if !self.store.resolve_expression(id, &resolution).await? {
            return Ok(None);
        }

        let status = resolution.status();
        metrics::expressions_resolved().add(1, &[KeyValue::new("status", status.to_string())]);
        match &resolution {
            Resolution::Done(value) => info!(expression_id = %id, value, "expression done"),
            Resolution::Error(reason) => {
                warn!(expression_id = %id, reason = %reason, "expression failed")
            }
        }
        Ok(Some(status))
    }
}

/// Parse and evaluate the whole text into its final resolution.
fn aggregate(text: &str) -> Resolution {
    let value = expr::parse(text)
        .map_err(Error::from)
        .and_then(|tree| expr::evaluate(&tree).map_err(Error::from));

    match value {
        Ok(value) if value.is_finite() => Resolution::Done(value),
        Ok(value) => Resolution::Error(Error::NonFinite(value).to_string()),
        Err(e) => Resolution::Error(e.to_string()),
    }
}
