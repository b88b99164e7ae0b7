//! Write-endpoint action client
//!
//! POSTs JSON action requests to the remote write endpoint. The endpoint runs
//! in a mode where the HTTP response body is not reliable, so all calls are
//! fire-and-forget: a 2xx means "probably accepted" and nothing is read back.
//! Audit-log appends additionally swallow transport errors entirely; losing a
//! log line must never disturb the caller.

use async_trait::async_trait;
use fieldops_common::config::Config;
use fieldops_common::types::{Account, Assignment};
use fieldops_common::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for action posts
const ACTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Action request body, tagged by `action` on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action")]
pub enum ActionRequest {
    /// Append one composite audit line
    #[serde(rename = "LOG_ACTION")]
    LogAction {
        #[serde(rename = "logData")]
        log_data: String,
        /// ISO-8601 timestamp of the event
        timestamp: String,
    },

    /// Record a solved assignment and its reward
    #[serde(rename = "SOLVE_TASK")]
    SolveTask {
        username: String,
        #[serde(rename = "taskName")]
        task_name: String,
        points: i64,
    },

    /// Replace a full account record, addressed by username on the remote side
    #[serde(rename = "UPDATE_USER")]
    UpdateUser { data: Account },

    /// Replace a full assignment record, addressed by name on the remote side
    #[serde(rename = "UPDATE_TASK")]
    UpdateTask { data: Assignment },
}

/// Sink for composed audit lines
///
/// Separated from the concrete client so the session machine can be tested
/// without a network.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Best-effort append; implementations must not fail the caller.
    async fn append_log(&self, line: String);
}

/// HTTP client for the write endpoint
pub struct ActionClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl ActionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(ACTION_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
        })
    }

    /// Post one action request. The response body is ignored by design.
    pub async fn submit(&self, request: &ActionRequest) -> Result<()> {
        debug!("Posting action to write endpoint");
        self.http_client
            .post(&self.api_url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Record a solved assignment for an account.
    pub async fn solve_task(&self, account: &Account, assignment: &Assignment) -> Result<()> {
        self.submit(&ActionRequest::SolveTask {
            username: account.username.clone(),
            task_name: assignment.name.clone(),
            points: assignment.points,
        })
        .await
    }

    /// Push a full updated account record.
    pub async fn update_account(&self, account: &Account) -> Result<()> {
        self.submit(&ActionRequest::UpdateUser {
            data: account.clone(),
        })
        .await
    }

    /// Push a full updated assignment record.
    pub async fn update_assignment(&self, assignment: &Assignment) -> Result<()> {
        self.submit(&ActionRequest::UpdateTask {
            data: assignment.clone(),
        })
        .await
    }
}

#[async_trait]
impl AuditSink for ActionClient {
    async fn append_log(&self, line: String) {
        let request = ActionRequest::LogAction {
            log_data: line,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.submit(&request).await {
            warn!("Audit log append failed (dropped): {e}");
        }
    }
}
