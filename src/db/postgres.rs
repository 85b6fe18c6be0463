//! PostgreSQL backend.
//!
//! Same schema as SQLite with native UUID and TIMESTAMPTZ columns. Claims use
//! `FOR UPDATE SKIP LOCKED` so concurrent orchestrator replicas never hand
//! out the same row.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    EXPRESSION_COLUMNS, Store, WORK_ITEM_COLUMNS, not_found_expression, not_found_work_item,
};
use crate::error::{Error, Result};
use crate::model::{Expression, ExpressionId, Resolution, WorkId, WorkItem, WorkState};

/// Store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres, create a connection pool, and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

impl Store for PgStore {
    async fn create_expression(&self, expression: &Expression, items: &[WorkItem]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO expressions (id, owner_id, text, status, result, error, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(expression.id.0)
        .bind(&expression.owner_id)
        .bind(&expression.text)
        .bind(expression.status.to_string())
        .bind(expression.result)
        .bind(&expression.error)
        .bind(expression.created_at)
        .bind(expression.updated_at)
        .execute(&mut *tx)
        .await?;

        let inserted = insert_items(&mut tx, items).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_expression(&self, id: ExpressionId) -> Result<Expression> {
        let sql = format!("SELECT {EXPRESSION_COLUMNS} FROM expressions WHERE id = $1");
        let row: Option<ExpressionRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| not_found_expression(id))?
            .try_into_expression()
    }

    async fn list_expressions(&self, owner_id: &str) -> Result<Vec<Expression>> {
        let sql =
            format!("SELECT {EXPRESSION_COLUMNS} FROM expressions WHERE owner_id = $1 ORDER BY created_at, id");
        let rows: Vec<ExpressionRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(ExpressionRow::try_into_expression)
            .collect()
    }

    async fn resolve_expression(&self, id: ExpressionId, resolution: &Resolution) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE expressions SET status = $1, result = $2, error = $3, updated_at = now()
             WHERE id = $4 AND status = 'pending'",
        )
        .bind(resolution.status().to_string())
        .bind(resolution.value())
        .bind(resolution.reason())
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn insert_work_items(&self, items: &[WorkItem]) -> Result<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let inserted = insert_items(&mut tx, items).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn claim_next_work_item(&self) -> Result<Option<WorkItem>> {
        let sql = format!(
            "UPDATE work_items SET state = 'claimed', updated_at = now()
             WHERE id = (
                 SELECT id FROM work_items WHERE state = 'pending'
                 ORDER BY created_at, id LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {WORK_ITEM_COLUMNS}"
        );
        let row: Option<WorkItemRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;

        row.map(WorkItemRow::try_into_work_item).transpose()
    }

    async fn complete_work_item(&self, id: WorkId, result: f64) -> Result<WorkItem> {
        let sql = format!(
            "UPDATE work_items SET state = 'done', result = $1, updated_at = now()
             WHERE id = $2 AND state = 'claimed'
             RETURNING {WORK_ITEM_COLUMNS}"
        );
        let row: Option<WorkItemRow> = sqlx::query_as(&sql)
            .bind(result)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into_work_item(),
            None => {
                let current = self.get_work_item(id).await?;
                Err(Error::InvalidTransition {
                    from: current.state,
                    to: WorkState::Done,
                })
            }
        }
    }

    async fn get_work_item(&self, id: WorkId) -> Result<WorkItem> {
        let sql = format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE id = $1");
        let row: Option<WorkItemRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| not_found_work_item(id))?
            .try_into_work_item()
    }

    async fn count_outstanding(&self, expression_id: ExpressionId) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM work_items WHERE expression_id = $1 AND state != 'done'",
        )
        .bind(expression_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn list_work_items(&self, expression_id: ExpressionId) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items WHERE expression_id = $1 ORDER BY created_at, id"
        );
        let rows: Vec<WorkItemRow> = sqlx::query_as(&sql)
            .bind(expression_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(WorkItemRow::try_into_work_item)
            .collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn insert_items(conn: &mut PgConnection, items: &[WorkItem]) -> Result<u64> {
    let mut inserted = 0;
    for item in items {
        inserted += sqlx::query(
            "INSERT INTO work_items (id, expression_id, operand1, operand2, operator, operation_time_ms, state, result, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (expression_id, operand1, operand2, operator) DO NOTHING",
        )
        .bind(item.id.0)
        .bind(item.expression_id.0)
        .bind(item.operand1)
        .bind(item.operand2)
        .bind(item.operator.to_string())
        .bind(i64::try_from(item.operation_time_ms).unwrap_or(i64::MAX))
        .bind(item.state.to_string())
        .bind(item.result)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ExpressionRow {
    id: Uuid,
    owner_id: String,
    text: String,
    status: String,
    result: Option<f64>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ExpressionRow {
    fn try_into_expression(self) -> Result<Expression> {
        Ok(Expression {
            id: ExpressionId(self.id),
            owner_id: self.owner_id,
            text: self.text,
            status: self.status.parse()?,
            result: self.result,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    expression_id: Uuid,
    operand1: f64,
    operand2: f64,
    operator: String,
    operation_time_ms: i64,
    state: String,
    result: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkItemRow {
    fn try_into_work_item(self) -> Result<WorkItem> {
        Ok(WorkItem {
            id: WorkId(self.id),
            expression_id: ExpressionId(self.expression_id),
            operand1: self.operand1,
            operand2: self.operand2,
            operator: self.operator.parse()?,
            operation_time_ms: self.operation_time_ms.max(0) as u64,
            state: self.state.parse()?,
            result: self.result,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
