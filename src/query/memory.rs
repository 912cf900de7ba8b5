//! In-process query service
//!
//! Understands the two statements the pipeline submits: the setup
//! `CREATE DATABASE IF NOT EXISTS` and `SELECT COUNT(*)` over a catalogued
//! table. The count reads every object under the table's location in the
//! shared `MemoryStorage`. Each status poll advances an execution one step
//! (SUBMITTED, RUNNING, then terminal), like a slow remote service.

use super::{ExecutionId, QueryRequest, QueryService, QueryState, QueryStatus, Row};
use crate::catalog::MemoryCatalog;
use crate::error::{LakeError, Result};
use crate::storage::MemoryStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Execution {
    request: QueryRequest,
    status: QueryStatus,
    rows: Vec<Row>,
}

#[derive(Debug, Clone)]
pub struct MemoryQueryService {
    storage: MemoryStorage,
    catalog: MemoryCatalog,
    executions: Arc<Mutex<HashMap<ExecutionId, Execution>>>,
}

enum Statement {
    CreateDatabase,
    Count { database: String, table: String },
}

fn parse_statement(query: &str) -> Option<Statement> {
    let trimmed = query.trim().trim_end_matches(';').trim();
    let upper = trimmed.to_ascii_uppercase();

    if upper.starts_with("CREATE DATABASE") {
        return Some(Statement::CreateDatabase);
    }

    const COUNT_PREFIX: &str = "SELECT COUNT(*) FROM ";
    if upper.starts_with(COUNT_PREFIX) {
        let target = trimmed[COUNT_PREFIX.len()..].trim();
        let mut parts = target.splitn(2, '.').map(|p| p.trim().trim_matches('"'));
        let database = parts.next()?.to_string();
        let table = parts.next()?.to_string();
        if database.is_empty() || table.is_empty() {
            return None;
        }
        return Some(Statement::Count { database, table });
    }

    None
}

/// Split `s3://bucket/prefix` into its bucket and key prefix
fn split_location(location: &str) -> Option<(&str, &str)> {
    let rest = location.strip_prefix("s3://")?;
    match rest.split_once('/') {
        Some((bucket, prefix)) => Some((bucket, prefix)),
        None => Some((rest, "")),
    }
}

impl MemoryQueryService {
    pub fn new(storage: MemoryStorage, catalog: MemoryCatalog) -> Self {
        Self {
            storage,
            catalog,
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Requests submitted so far, in no particular order
    pub fn submitted(&self) -> Vec<QueryRequest> {
        self.executions
            .lock()
            .unwrap()
            .values()
            .map(|e| e.request.clone())
            .collect()
    }

    fn evaluate(&self, request: &QueryRequest) -> std::result::Result<Vec<Row>, String> {
        match parse_statement(&request.query) {
            Some(Statement::CreateDatabase) => Ok(Vec::new()),
            Some(Statement::Count { database, table }) => {
                let definition = self.catalog.table(&database, &table).ok_or_else(|| {
                    format!("TABLE_NOT_FOUND: Table {}.{} does not exist", database, table)
                })?;
                let (bucket, prefix) = split_location(&definition.location)
                    .ok_or_else(|| format!("Invalid table location {}", definition.location))?;

                let count: usize = self
                    .storage
                    .objects_under(bucket, prefix)
                    .iter()
                    .map(|body| body.lines().filter(|l| !l.trim().is_empty()).count())
                    .sum();

                Ok(vec![
                    vec![Some("_col0".to_string())],
                    vec![Some(count.to_string())],
                ])
            }
            None => Err(format!("Unsupported statement: {}", request.query)),
        }
    }
}

#[async_trait]
impl QueryService for MemoryQueryService {
    async fn start_query(&self, request: &QueryRequest) -> Result<ExecutionId> {
        if request.output_location.trim().is_empty() {
            return Err(LakeError::Submit(
                "No output location provided for query results".to_string(),
            ));
        }

        let id = ExecutionId::new(Uuid::new_v4().to_string());
        self.executions.lock().unwrap().insert(
            id.clone(),
            Execution {
                request: request.clone(),
                status: QueryStatus::new(QueryState::Submitted),
                rows: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn query_status(&self, id: &ExecutionId) -> Result<QueryStatus> {
        let mut executions = self.executions.lock().unwrap();
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| LakeError::Query(format!("unknown execution {}", id)))?;

        let current = execution.status.clone();
        match current.state {
            QueryState::Submitted => execution.status = QueryStatus::new(QueryState::Running),
            QueryState::Running => match self.evaluate(&execution.request) {
                Ok(rows) => {
                    execution.rows = rows;
                    execution.status = QueryStatus::new(QueryState::Succeeded);
                }
                Err(reason) => {
                    execution.status = QueryStatus::with_reason(QueryState::Failed, reason);
                }
            },
            _ => {}
        }
        Ok(current)
    }

    async fn query_results(&self, id: &ExecutionId) -> Result<Vec<Row>> {
        let executions = self.executions.lock().unwrap();
        let execution = executions
            .get(id)
            .ok_or_else(|| LakeError::Query(format!("unknown execution {}", id)))?;
        if execution.status.state != QueryState::Succeeded {
            return Err(LakeError::Query(format!(
                "execution {} is {}, results unavailable",
                id, execution.status.state
            )));
        }
        Ok(execution.rows.clone())
    }

    async fn stop_query(&self, id: &ExecutionId) -> Result<()> {
        let mut executions = self.executions.lock().unwrap();
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| LakeError::Query(format!("unknown execution {}", id)))?;
        if !execution.status.state.is_terminal() {
            execution.status = QueryStatus::with_reason(QueryState::Cancelled, "stopped by caller");
        }
        Ok(())
    }
}
