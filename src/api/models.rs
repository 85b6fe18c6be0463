//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::model::{Expression, ExpressionId, ExpressionStatus, Task};

/// Body of `GET /internal/task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

/// Body of a successful `POST /internal/task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub expression_id: ExpressionId,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: ExpressionId,
}

/// An expression as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionView {
    pub id: ExpressionId,
    pub expression: String,
    pub status: ExpressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Expression> for ExpressionView {
    fn from(expression: Expression) -> Self {
        Self {
            id: expression.id,
            expression: expression.text,
            status: expression.status,
            result: expression.result,
            error: expression.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListExpressionsResponse {
    pub expressions: Vec<ExpressionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
