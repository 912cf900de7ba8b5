//! AWS Glue Data Catalog backend

use super::{CatalogService, TableDefinition};
use crate::error::{LakeError, Result};
use async_trait::async_trait;
use aws_sdk_glue::error::{BuildError, DisplayErrorContext};
use aws_sdk_glue::types::{
    Column as GlueColumn, DatabaseInput, SerDeInfo, StorageDescriptor, TableInput,
};
use aws_sdk_glue::Client;

const SERVICE: &str = "Glue";

pub struct GlueCatalog {
    client: Client,
}

impl GlueCatalog {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn build_error(err: BuildError) -> LakeError {
    LakeError::provider(SERVICE, format!("invalid request: {}", err))
}

fn table_input(table: &TableDefinition) -> Result<TableInput> {
    let columns = table
        .schema
        .columns
        .iter()
        .map(|column| {
            GlueColumn::builder()
                .name(&column.name)
                .r#type(column.column_type.as_str())
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>>>()?;

    let storage = StorageDescriptor::builder()
        .set_columns(Some(columns))
        .location(&table.location)
        .input_format(&table.formats.input_format)
        .output_format(&table.formats.output_format)
        .serde_info(
            SerDeInfo::builder()
                .serialization_library(&table.formats.serialization_library)
                .build(),
        )
        .build();

    TableInput::builder()
        .name(&table.name)
        .storage_descriptor(storage)
        .table_type(&table.table_type)
        .build()
        .map_err(build_error)
}

#[async_trait]
impl CatalogService for GlueCatalog {
    async fn create_database(&self, name: &str, description: &str) -> Result<()> {
        let input = DatabaseInput::builder()
            .name(name)
            .description(description)
            .build()
            .map_err(build_error)?;

        match self.client.create_database().database_input(input).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_already_exists_exception())
                    .unwrap_or(false)
                {
                    Err(LakeError::already_exists(format!("database {}", name)))
                } else {
                    Err(LakeError::provider(SERVICE, DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn create_table(&self, database: &str, table: &TableDefinition) -> Result<()> {
        let input = table_input(table)?;

        match self
            .client
            .create_table()
            .database_name(database)
            .table_input(input)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_already_exists_exception())
                    .unwrap_or(false)
                {
                    Err(LakeError::already_exists(format!("table {}.{}", database, table.name)))
                } else {
                    Err(LakeError::provider(SERVICE, DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }
}
