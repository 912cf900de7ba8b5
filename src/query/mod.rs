//! Query Orchestrator - submit, poll, fetch
//!
//! The query service runs statements asynchronously: submission returns an
//! execution id straight away and the caller polls its state at a fixed
//! interval until it is terminal. Backends:
//! - `AthenaQueryService` for Amazon Athena
//! - `MemoryQueryService` simulating a count over in-memory storage

pub mod athena;
pub mod memory;

pub use athena::AthenaQueryService;
pub use memory::MemoryQueryService;

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Submitted => "SUBMITTED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryStatus {
    pub state: QueryState,
    /// Service-provided explanation, usually only set on failure
    pub reason: Option<String>,
}

impl QueryStatus {
    pub fn new(state: QueryState) -> Self {
        Self { state, reason: None }
    }

    pub fn with_reason(state: QueryState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: Some(reason.into()),
        }
    }
}

/// One result row; `None` for SQL NULL
pub type Row = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    /// Catalog database the statement runs against
    pub database: String,
    /// Where the service stages result files
    pub output_location: String,
}

impl QueryRequest {
    pub fn new(
        query: impl Into<String>,
        database: impl Into<String>,
        output_location: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            database: database.into(),
            output_location: output_location.into(),
        }
    }
}

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Non-blocking submission
    async fn start_query(&self, request: &QueryRequest) -> Result<ExecutionId>;

    async fn query_status(&self, id: &ExecutionId) -> Result<QueryStatus>;

    /// Only meaningful once the execution has SUCCEEDED
    async fn query_results(&self, id: &ExecutionId) -> Result<Vec<Row>>;

    async fn stop_query(&self, id: &ExecutionId) -> Result<()>;
}

/// `SELECT COUNT(*) FROM "db"."table";`
pub fn count_query(database: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM \"{}\".\"{}\";", database, table)
}

/// Statement submitted once during setup to prepare the query service
pub fn setup_statement(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// None polls until a terminal state, however long that takes
    pub max_wait: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AbandonReason {
    TimedOut(Duration),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    Terminal(QueryStatus),
    Abandoned(AbandonReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Succeeded {
        execution_id: ExecutionId,
        rows: Vec<Row>,
    },
    /// Service reported FAILED or CANCELLED
    Terminated {
        execution_id: ExecutionId,
        status: QueryStatus,
    },
    /// Caller stopped waiting (timeout or cancellation)
    Abandoned {
        execution_id: ExecutionId,
        reason: AbandonReason,
    },
    /// Cancelled before the statement reached the service
    NotSubmitted,
}

impl QueryOutcome {
    pub fn execution_id(&self) -> Option<&ExecutionId> {
        match self {
            QueryOutcome::Succeeded { execution_id, .. }
            | QueryOutcome::Terminated { execution_id, .. }
            | QueryOutcome::Abandoned { execution_id, .. } => Some(execution_id),
            QueryOutcome::NotSubmitted => None,
        }
    }

    /// Empty unless the query succeeded
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryOutcome::Succeeded { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Succeeded { .. })
    }
}

pub struct QueryOrchestrator<'a> {
    service: &'a dyn QueryService,
    settings: PollSettings,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(service: &'a dyn QueryService, settings: PollSettings) -> Self {
        Self { service, settings }
    }

    pub async fn submit(&self, request: &QueryRequest) -> Result<ExecutionId> {
        let id = self.service.start_query(request).await?;
        info!("Query Execution ID: {}", id);
        Ok(id)
    }

    /// Submit without waiting for the execution to finish
    pub async fn submit_setup(&self, request: &QueryRequest) -> Result<ExecutionId> {
        let id = self.service.start_query(request).await?;
        debug!("Setup statement submitted as {}", id);
        Ok(id)
    }

    /// Poll until terminal, the configured max wait elapses, or `cancel` fires.
    pub async fn wait(
        &self,
        id: &ExecutionId,
        cancel: &CancellationToken,
    ) -> Result<WaitResult> {
        let started = Instant::now();
        loop {
            let status = self.service.query_status(id).await?;
            debug!("Query {} is {}", id, status.state);
            if status.state.is_terminal() {
                return Ok(WaitResult::Terminal(status));
            }

            let mut sleep_for = self.settings.interval;
            if let Some(max_wait) = self.settings.max_wait {
                let elapsed = started.elapsed();
                if elapsed >= max_wait {
                    return Ok(WaitResult::Abandoned(AbandonReason::TimedOut(max_wait)));
                }
                sleep_for = sleep_for.min(max_wait - elapsed);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(WaitResult::Abandoned(AbandonReason::Cancelled)),
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }

    /// Submit, wait, and on success fetch the result rows once.
    pub async fn run(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome> {
        if cancel.is_cancelled() {
            info!("Cancelled before submission, not running query");
            return Ok(QueryOutcome::NotSubmitted);
        }
        let execution_id = self.submit(request).await?;

        match self.wait(&execution_id, cancel).await? {
            WaitResult::Terminal(status) if status.state == QueryState::Succeeded => {
                let rows = self.service.query_results(&execution_id).await?;
                info!("Query {} succeeded with {} rows", execution_id, rows.len());
                Ok(QueryOutcome::Succeeded { execution_id, rows })
            }
            WaitResult::Terminal(status) => {
                warn!(
                    "Query failed with state: {}{}",
                    status.state,
                    status
                        .reason
                        .as_deref()
                        .map(|r| format!(" ({})", r))
                        .unwrap_or_default()
                );
                Ok(QueryOutcome::Terminated {
                    execution_id,
                    status,
                })
            }
            WaitResult::Abandoned(reason) => {
                warn!("Stopped waiting for query {}: {:?}", execution_id, reason);
                if let Err(e) = self.service.stop_query(&execution_id).await {
                    warn!("Failed to stop query {}: {}", execution_id, e);
                }
                Ok(QueryOutcome::Abandoned {
                    execution_id,
                    reason,
                })
            }
        }
    }
}
