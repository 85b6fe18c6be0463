//! HTTP surface of the orchestrator.
//!
//! Worker-facing routes live under `/internal`, client-facing routes under
//! `/api/v1`. Client routes are scoped to the [`Owner`] in the
//! `X-Owner-Id` header.

pub mod error;
pub mod extract;
pub mod models;

pub use error::ApiError;
pub use extract::{OWNER_HEADER, Owner};

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Store;
use crate::engine::Orchestrator;
use crate::error::Result;
use crate::model::{ExpressionId, Task, TaskResult};
use models::{
    CalculateRequest, CalculateResponse, ExpressionResponse, ExpressionView, HealthResponse,
    ListExpressionsResponse, ReportResponse, TaskResponse,
};

type AppState<S> = State<Arc<Orchestrator<S>>>;

/// Build the router with all routes and the orchestrator as state.
pub fn router<S: Store>(orchestrator: Arc<Orchestrator<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/internal/task", get(pull_task::<S>).post(report_task::<S>))
        .route("/api/v1/calculate", post(calculate::<S>))
        .route("/api/v1/expressions", get(list_expressions::<S>))
        .route("/api/v1/expressions/{id}", get(get_expression::<S>))
        .route("/health", get(health::<S>))
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<S: Store>(
    orchestrator: Arc<Orchestrator<S>>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "orchestrator listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("orchestrator stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Worker-facing
// ---------------------------------------------------------------------------

async fn pull_task<S: Store>(
    State(orchestrator): AppState<S>,
) -> std::result::Result<Json<TaskResponse>, ApiError> {
    let item = orchestrator.pull_work().await?.ok_or(ApiError::NoTask)?;
    Ok(Json(TaskResponse {
        task: Task::from(&item),
    }))
}

async fn report_task<S: Store>(
    State(orchestrator): AppState<S>,
    payload: std::result::Result<Json<TaskResult>, JsonRejection>,
) -> std::result::Result<Json<ReportResponse>, ApiError> {
    let Json(report) = payload.map_err(|e| ApiError::BadPayload(e.body_text()))?;
    let outcome = orchestrator.report_result(report.id, report.result).await?;
    Ok(Json(ReportResponse {
        expression_id: outcome.item.expression_id,
        remaining: outcome.remaining,
    }))
}

// ---------------------------------------------------------------------------
// Client-facing
// ---------------------------------------------------------------------------

async fn calculate<S: Store>(
    State(orchestrator): AppState<S>,
    owner: Owner,
    payload: std::result::Result<Json<CalculateRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadPayload(e.body_text()))?;
    let expression = orchestrator
        .submit(owner.as_str(), &request.expression)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CalculateResponse { id: expression.id }),
    ))
}

async fn list_expressions<S: Store>(
    State(orchestrator): AppState<S>,
    owner: Owner,
) -> std::result::Result<Json<ListExpressionsResponse>, ApiError> {
    let expressions = orchestrator.list_expressions(owner.as_str()).await?;
    Ok(Json(ListExpressionsResponse {
        expressions: expressions.into_iter().map(ExpressionView::from).collect(),
    }))
}

async fn get_expression<S: Store>(
    State(orchestrator): AppState<S>,
    owner: Owner,
    Path(id): Path<String>,
) -> std::result::Result<Json<ExpressionResponse>, ApiError> {
    // A malformed ID cannot name an expression.
    let id: ExpressionId = id
        .parse()
        .map_err(|_| crate::error::Error::NotFound(format!("expression {id}")))?;
    let expression = orchestrator.get_expression(id, owner.as_str()).await?;
    Ok(Json(ExpressionResponse {
        expression: expression.into(),
    }))
}

async fn health<S: Store>(
    State(orchestrator): AppState<S>,
) -> std::result::Result<Json<HealthResponse>, ApiError> {
    orchestrator
        .store()
        .health_check()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
