//! Emits newly computable operations as work items.
//!
//! A node is computable when both of its direct children are literal leaves.
//! Trees are parsed fresh for every pass and never rewritten with computed
//! values, so an operation whose operand is another operation is never
//! emitted. Repeated passes over the same expression are idempotent through
//! the store's uniqueness key.

use tracing::debug;

use crate::config::OperationTimings;
use crate::db::Store;
use crate::error::Result;
use crate::expr::OperationNode;
use crate::model::{ExpressionId, WorkItem};
use crate::telemetry::metrics;

#[derive(Debug, Clone)]
pub struct Scheduler {
    timings: OperationTimings,
}

impl Scheduler {
    pub fn new(timings: OperationTimings) -> Self {
        Self { timings }
    }

    /// Walk the tree post-order and build a pending work item for every
    /// unscheduled node over two leaves, marking each such node scheduled.
    ///
    /// Pure: nothing is persisted. Equal operations in different subtrees
    /// each produce an item; the store keeps one.
    pub fn plan(&self, expression_id: ExpressionId, tree: &mut OperationNode) -> Vec<WorkItem> {
        let mut items = Vec::new();
        self.walk(expression_id, tree, &mut items);
        items
    }

    fn walk(&self, expression_id: ExpressionId, node: &mut OperationNode, items: &mut Vec<WorkItem>) {
        let OperationNode::Operation {
            operator,
            left,
            right,
            scheduled,
        } = node
        else {
            return;
        };

        self.walk(expression_id, left, items);
        self.walk(expression_id, right, items);

        if *scheduled {
            return;
        }
        if let (Some(operand1), Some(operand2)) = (left.leaf_value(), right.leaf_value()) {
            items.push(WorkItem::pending(
                expression_id,
                operand1,
                operand2,
                *operator,
                self.timings.for_operator(*operator),
            ));
            *scheduled = true;
        }
    }

    /// Plan the tree and insert the result in one idempotent batch.
    ///
    /// Returns how many work items were new to the store.
    pub async fn schedule_ready<S: Store>(
        &self,
        store: &S,
        expression_id: ExpressionId,
        tree: &mut OperationNode,
    ) -> Result<u64> {
        let items = self.plan(expression_id, tree);
        let inserted = store.insert_work_items(&items).await?;

        if inserted > 0 {
            metrics::work_items_scheduled().add(inserted, &[]);
        }
        debug!(
            expression_id = %expression_id,
            planned = items.len(),
            inserted,
            "scheduling pass"
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::expr::{Operator, parse};

    fn scheduler() -> Scheduler {
        Scheduler::new(OperationTimings {
            addition: Duration::from_millis(10),
            subtraction: Duration::from_millis(20),
            multiplication: Duration::from_millis(30),
            division: Duration::from_millis(40),
        })
    }

    fn plan(text: &str) -> Vec<(f64, f64, Operator)> {
        let mut tree = parse(text).unwrap();
        scheduler()
            .plan(ExpressionId::new(), &mut tree)
            .into_iter()
            .map(|item| (item.operand1, item.operand2, item.operator))
            .collect()
    }

    #[test]
    fn literal_produces_nothing() {
        assert!(plan("42").is_empty());
    }

    #[test]
    fn only_leaf_pairs_are_emitted() {
        assert_eq!(plan("(2+3)*4"), vec![(2.0, 3.0, Operator::Add)]);
        assert_eq!(plan("2+2*2"), vec![(2.0, 2.0, Operator::Multiply)]);
        assert_eq!(plan("1-2-3"), vec![(1.0, 2.0, Operator::Subtract)]);
    }

    #[test]
    fn independent_subtrees_are_emitted_in_post_order() {
        assert_eq!(
            plan("(1+2)*(6/3)"),
            vec![(1.0, 2.0, Operator::Add), (6.0, 3.0, Operator::Divide)]
        );
    }

    #[test]
    fn items_carry_operator_timing_and_start_pending() {
        let id = ExpressionId::new();
        let mut tree = parse("(8/2)-(3*1)").unwrap();
        let items = scheduler().plan(id, &mut tree);

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.expression_id == id));
        assert!(
            items
                .iter()
                .all(|item| item.state == crate::model::WorkState::Pending)
        );
        assert_eq!(items[0].operation_time(), Duration::from_millis(40));
        assert_eq!(items[1].operation_time(), Duration::from_millis(30));
    }

    #[test]
    fn second_walk_of_same_tree_emits_nothing() {
        let scheduler = scheduler();
        let id = ExpressionId::new();
        let mut tree = parse("(1+2)*(3+4)").unwrap();

        assert_eq!(scheduler.plan(id, &mut tree).len(), 2);
        assert!(scheduler.plan(id, &mut tree).is_empty());
    }

    #[test]
    fn fresh_parse_resets_scheduled_marks() {
        let scheduler = scheduler();
        let id = ExpressionId::new();

        let mut first = parse("2*3+1").unwrap();
        let mut second = parse("2*3+1").unwrap();
        assert_eq!(scheduler.plan(id, &mut first).len(), 1);
        assert_eq!(scheduler.plan(id, &mut second).len(), 1);
    }
}
