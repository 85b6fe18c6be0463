//! HTTP client for the orchestrator's worker-facing routes.

use std::time::Duration;

use reqwest::StatusCode;

use crate::api::models::{ReportResponse, TaskResponse};
use crate::error::{Error, Result};
use crate::model::{Task, TaskResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    http: reqwest::Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Claim one task. `None` when the orchestrator has nothing pending.
    pub async fn pull(&self) -> Result<Option<Task>> {
        let response = self
            .http
            .get(format!("{}/internal/task", self.base_url))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: TaskResponse = response.error_for_status()?.json().await?;
        Ok(Some(body.task))
    }

    /// Report a computed result.
    pub async fn report(&self, result: &TaskResult) -> Result<ReportResponse> {
        let response = self
            .http
            .post(format!("{}/internal/task", self.base_url))
            .json(result)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("work item {}", result.id))),
            _ => Ok(response.error_for_status()?.json().await?),
        }
    }
}
