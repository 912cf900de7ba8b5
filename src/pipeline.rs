//! Pipeline Driver
//!
//! Runs the provisioning steps in a fixed order:
//! BUCKET -> DATABASE -> FETCH -> UPLOAD -> TABLE -> QUERY_SETUP -> QUERY_RUN -> DONE
//!
//! A failing step is logged and recorded, never retried, and never stops the
//! run. The one conditional step is UPLOAD, skipped when FETCH produced no
//! records. DONE is always reached, even after cancellation, which records
//! every unfinished step as skipped.

use crate::catalog::{ensure_database, ensure_table, CatalogService, TableDefinition};
use crate::config::LakeConfig;
use crate::error::Result;
use crate::provision::Provisioned;
use crate::query::{
    count_query, setup_statement, PollSettings, QueryOrchestrator, QueryOutcome, QueryRequest,
    QueryService, Row,
};
use crate::serializer::to_json_lines;
use crate::source::{Record, RecordSource};
use crate::storage::{ensure_bucket, upload_payload, ObjectStorage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStep {
    Bucket,
    Database,
    Fetch,
    Upload,
    Table,
    QuerySetup,
    QueryRun,
    Done,
}

impl PipelineStep {
    pub const ORDER: [PipelineStep; 8] = [
        PipelineStep::Bucket,
        PipelineStep::Database,
        PipelineStep::Fetch,
        PipelineStep::Upload,
        PipelineStep::Table,
        PipelineStep::QuerySetup,
        PipelineStep::QueryRun,
        PipelineStep::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Bucket => "BUCKET",
            PipelineStep::Database => "DATABASE",
            PipelineStep::Fetch => "FETCH",
            PipelineStep::Upload => "UPLOAD",
            PipelineStep::Table => "TABLE",
            PipelineStep::QuerySetup => "QUERY_SETUP",
            PipelineStep::QueryRun => "QUERY_RUN",
            PipelineStep::Done => "DONE",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    AlreadyExisted,
    Skipped(String),
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl From<Provisioned> for StepOutcome {
    fn from(provisioned: Provisioned) -> Self {
        match provisioned {
            Provisioned::Created => StepOutcome::Completed,
            Provisioned::AlreadyExisted => StepOutcome::AlreadyExisted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: PipelineStep,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub steps: Vec<StepReport>,
    pub records_fetched: usize,
    pub query: Option<QueryOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            records_fetched: 0,
            query: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, step: PipelineStep, outcome: StepOutcome) {
        self.steps.push(StepReport { step, outcome });
    }

    pub fn outcome(&self, step: PipelineStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| &report.outcome)
    }

    pub fn final_step(&self) -> Option<PipelineStep> {
        self.steps.last().map(|report| report.step)
    }

    pub fn reached_done(&self) -> bool {
        self.final_step() == Some(PipelineStep::Done)
    }

    /// Rows of the count query; empty unless it succeeded
    pub fn result_rows(&self) -> &[Row] {
        self.query.as_ref().map(QueryOutcome::rows).unwrap_or(&[])
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn failed_steps(&self) -> Vec<PipelineStep> {
        self.steps
            .iter()
            .filter(|report| report.outcome.is_failure())
            .map(|report| report.step)
            .collect()
    }
}

/// Skip reason recorded for steps that never ran because of cancellation
pub const CANCELLED: &str = "cancelled";

/// Log a failed step and turn it into a recorded outcome
fn settle<T>(step: PipelineStep, result: Result<T>) -> std::result::Result<T, StepOutcome> {
    result.map_err(|err| {
        error!("{} step failed: {}", step, err);
        StepOutcome::Failed(err.to_string())
    })
}

pub struct Pipeline<'a> {
    config: &'a LakeConfig,
    source: Arc<dyn RecordSource>,
    storage: Arc<dyn ObjectStorage>,
    catalog: Arc<dyn CatalogService>,
    queries: Arc<dyn QueryService>,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a LakeConfig,
        source: Arc<dyn RecordSource>,
        storage: Arc<dyn ObjectStorage>,
        catalog: Arc<dyn CatalogService>,
        queries: Arc<dyn QueryService>,
    ) -> Self {
        Self {
            config,
            source,
            storage,
            catalog,
            queries,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run. Steps not yet finished when it fires are
    /// recorded as skipped; an in-flight query wait is abandoned.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Await `work` unless the run is cancelled first
    async fn unless_cancelled<T>(&self, work: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            value = work => Some(value),
        }
    }

    pub async fn run(&self) -> PipelineReport {
        let config = self.config;
        let mut report = PipelineReport::new();
        info!("Setting up data lake for NBA sports analytics...");

        // BUCKET
        let outcome = match self
            .unless_cancelled(ensure_bucket(self.storage.as_ref(), &config.bucket, &config.region))
            .await
        {
            Some(result) => settle(PipelineStep::Bucket, result)
                .map_or_else(|failed| failed, StepOutcome::from),
            None => cancelled(PipelineStep::Bucket),
        };
        report.record(PipelineStep::Bucket, outcome);
        if !config.bucket_settle_delay.is_zero() {
            // Let bucket creation propagate before anything is written to it
            self.unless_cancelled(tokio::time::sleep(config.bucket_settle_delay))
                .await;
        }

        // DATABASE
        let outcome = match self
            .unless_cancelled(ensure_database(self.catalog.as_ref(), &config.database))
            .await
        {
            Some(result) => settle(PipelineStep::Database, result)
                .map_or_else(|failed| failed, StepOutcome::from),
            None => cancelled(PipelineStep::Database),
        };
        report.record(PipelineStep::Database, outcome);

        // FETCH
        let records: Vec<Record> = match self.unless_cancelled(self.source.fetch()).await {
            Some(result) => match settle(PipelineStep::Fetch, result) {
                Ok(records) => {
                    report.record(PipelineStep::Fetch, StepOutcome::Completed);
                    records
                }
                Err(failed) => {
                    report.record(PipelineStep::Fetch, failed);
                    Vec::new()
                }
            },
            None => {
                report.record(PipelineStep::Fetch, cancelled(PipelineStep::Fetch));
                Vec::new()
            }
        };
        report.records_fetched = records.len();

        // UPLOAD
        let outcome = if self.cancel.is_cancelled() {
            cancelled(PipelineStep::Upload)
        } else if records.is_empty() {
            warn!("No player data fetched, skipping upload");
            StepOutcome::Skipped("no records fetched".to_string())
        } else {
            info!("Converting data to line-delimited JSON format...");
            let payload = to_json_lines(&records);
            let key = config.object_key();
            let upload = upload_payload(self.storage.as_ref(), &config.bucket, &key, payload);
            match self.unless_cancelled(upload).await {
                Some(result) => settle(PipelineStep::Upload, result)
                    .map_or_else(|failed| failed, |_| StepOutcome::Completed),
                None => cancelled(PipelineStep::Upload),
            }
        };
        report.record(PipelineStep::Upload, outcome);

        // TABLE
        let table = TableDefinition::players(config);
        let outcome = match self
            .unless_cancelled(ensure_table(self.catalog.as_ref(), &config.database, &table))
            .await
        {
            Some(result) => settle(PipelineStep::Table, result)
                .map_or_else(|failed| failed, StepOutcome::from),
            None => cancelled(PipelineStep::Table),
        };
        report.record(PipelineStep::Table, outcome);

        let orchestrator = QueryOrchestrator::new(
            self.queries.as_ref(),
            PollSettings {
                interval: config.poll_interval,
                max_wait: config.max_wait,
            },
        );

        // QUERY_SETUP
        let setup = QueryRequest::new(
            setup_statement(&config.setup_database),
            &config.database,
            config.query_output_location(),
        );
        let outcome = match self.unless_cancelled(orchestrator.submit_setup(&setup)).await {
            Some(result) => settle(PipelineStep::QuerySetup, result).map_or_else(
                |failed| failed,
                |_| {
                    info!("Athena output location configured successfully.");
                    StepOutcome::Completed
                },
            ),
            None => cancelled(PipelineStep::QuerySetup),
        };
        report.record(PipelineStep::QuerySetup, outcome);
        info!("Data lake setup complete.");

        // QUERY_RUN
        // The orchestrator watches the token itself so an abandoned wait can
        // still stop the execution.
        let request = QueryRequest::new(
            count_query(&config.database, &config.table),
            &config.database,
            config.query_output_location(),
        );
        let outcome = match settle(
            PipelineStep::QueryRun,
            orchestrator.run(&request, &self.cancel).await,
        ) {
            Ok(query) => {
                let outcome = match &query {
                    QueryOutcome::Succeeded { .. } => StepOutcome::Completed,
                    QueryOutcome::Terminated { status, .. } => {
                        StepOutcome::Failed(format!("query finished as {}", status.state))
                    }
                    QueryOutcome::Abandoned { reason, .. } => {
                        StepOutcome::Failed(format!("query abandoned: {:?}", reason))
                    }
                    QueryOutcome::NotSubmitted => cancelled(PipelineStep::QueryRun),
                };
                report.query = Some(query);
                outcome
            }
            Err(failed) => failed,
        };
        report.record(PipelineStep::QueryRun, outcome);

        report.record(PipelineStep::Done, StepOutcome::Completed);
        report.finished_at = Some(Utc::now());
        report
    }
}

fn cancelled(step: PipelineStep) -> StepOutcome {
    warn!("{} step skipped: run cancelled", step);
    StepOutcome::Skipped(CANCELLED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        let names: Vec<&str> = PipelineStep::ORDER.iter().map(PipelineStep::as_str).collect();
        assert_eq!(
            names,
            vec!["BUCKET", "DATABASE", "FETCH", "UPLOAD", "TABLE", "QUERY_SETUP", "QUERY_RUN", "DONE"]
        );
        assert!(PipelineStep::ORDER.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_provisioned_maps_to_outcome() {
        assert_eq!(StepOutcome::from(Provisioned::Created), StepOutcome::Completed);
        assert_eq!(
            StepOutcome::from(Provisioned::AlreadyExisted),
            StepOutcome::AlreadyExisted
        );
        assert!(StepOutcome::Failed("boom".to_string()).is_failure());
        assert!(!StepOutcome::Skipped("empty".to_string()).is_failure());
    }

    #[test]
    fn test_report_serializes_step_names_and_reasons() {
        let mut report = PipelineReport::new();
        report.record(PipelineStep::QuerySetup, StepOutcome::Completed);
        report.record(
            PipelineStep::Upload,
            StepOutcome::Skipped("no records fetched".to_string()),
        );

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["steps"][0]["step"], "QUERY_SETUP");
        assert_eq!(value["steps"][0]["outcome"]["status"], "completed");
        assert_eq!(value["steps"][1]["outcome"]["status"], "skipped");
        assert_eq!(value["steps"][1]["outcome"]["reason"], "no records fetched");
        assert!(value["query"].is_null());
    }
}
