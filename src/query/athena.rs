//! Amazon Athena backend

use super::{ExecutionId, QueryRequest, QueryService, QueryState, QueryStatus, Row};
use crate::error::{LakeError, Result};
use async_trait::async_trait;
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{
    QueryExecutionContext, QueryExecutionState, ResultConfiguration, Row as AthenaRow,
};
use aws_sdk_athena::Client;

pub struct AthenaQueryService {
    client: Client,
}

impl AthenaQueryService {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

/// QUEUED is Athena's name for a submitted execution.
pub(crate) fn map_state(state: &QueryExecutionState) -> Option<QueryState> {
    match state {
        QueryExecutionState::Queued => Some(QueryState::Submitted),
        QueryExecutionState::Running => Some(QueryState::Running),
        QueryExecutionState::Succeeded => Some(QueryState::Succeeded),
        QueryExecutionState::Failed => Some(QueryState::Failed),
        QueryExecutionState::Cancelled => Some(QueryState::Cancelled),
        _ => None,
    }
}

fn convert_row(row: &AthenaRow) -> Row {
    row.data()
        .iter()
        .map(|datum| datum.var_char_value().map(str::to_string))
        .collect()
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(&self, request: &QueryRequest) -> Result<ExecutionId> {
        let output = self
            .client
            .start_query_execution()
            .query_string(&request.query)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&request.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| LakeError::Submit(DisplayErrorContext(&err).to_string()))?;

        output
            .query_execution_id()
            .map(ExecutionId::new)
            .ok_or_else(|| LakeError::Submit("Athena returned no QueryExecutionId".to_string()))
    }

    async fn query_status(&self, id: &ExecutionId) -> Result<QueryStatus> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(id.as_str())
            .send()
            .await
            .map_err(|err| LakeError::Query(DisplayErrorContext(&err).to_string()))?;

        let status = output
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or_else(|| LakeError::Query(format!("no status for execution {}", id)))?;

        let raw_state = status
            .state()
            .ok_or_else(|| LakeError::Query(format!("no state for execution {}", id)))?;
        let state = map_state(raw_state).ok_or_else(|| {
            LakeError::Query(format!("unrecognised query state {}", raw_state.as_str()))
        })?;

        Ok(QueryStatus {
            state,
            reason: status.state_change_reason().map(str::to_string),
        })
    }

    async fn query_results(&self, id: &ExecutionId) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .get_query_results()
                .query_execution_id(id.as_str())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| LakeError::Query(DisplayErrorContext(&err).to_string()))?;

            if let Some(result_set) = output.result_set() {
                rows.extend(result_set.rows().iter().map(convert_row));
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(rows)
    }

    async fn stop_query(&self, id: &ExecutionId) -> Result<()> {
        self.client
            .stop_query_execution()
            .query_execution_id(id.as_str())
            .send()
            .await
            .map_err(|err| LakeError::Query(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_athena::types::Datum;

    #[test]
    fn test_map_state() {
        assert_eq!(map_state(&QueryExecutionState::Queued), Some(QueryState::Submitted));
        assert_eq!(map_state(&QueryExecutionState::Running), Some(QueryState::Running));
        assert_eq!(map_state(&QueryExecutionState::Succeeded), Some(QueryState::Succeeded));
        assert_eq!(map_state(&QueryExecutionState::Failed), Some(QueryState::Failed));
        assert_eq!(map_state(&QueryExecutionState::Cancelled), Some(QueryState::Cancelled));
    }

    #[test]
    fn test_convert_row_keeps_nulls() {
        let row = AthenaRow::builder()
            .data(Datum::builder().var_char_value("_col0").build())
            .data(Datum::builder().build())
            .build();
        assert_eq!(convert_row(&row), vec![Some("_col0".to_string()), None]);
    }
}
