//! Metadata Catalog - database and table registration
//!
//! The table describes the uploaded line-delimited JSON so the query engine
//! can read it: fixed columns, a storage location, and the input/output
//! format plus SerDe descriptors.

pub mod glue;
pub mod memory;

pub use glue::GlueCatalog;
pub use memory::MemoryCatalog;

use crate::config::LakeConfig;
use crate::error::Result;
use crate::provision::{reclassify_conflict, Provisioned};
use async_trait::async_trait;
use std::fmt;
use tracing::info;

pub const EXTERNAL_TABLE: &str = "EXTERNAL_TABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    String,
}

impl ColumnType {
    /// Hive type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::String => "string",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Schema of the player table. Column names match the API's record fields.
pub fn player_schema() -> TableSchema {
    TableSchema {
        columns: vec![
            Column::new("PlayerID", ColumnType::Int),
            Column::new("FirstName", ColumnType::String),
            Column::new("LastName", ColumnType::String),
            Column::new("Team", ColumnType::String),
            Column::new("Position", ColumnType::String),
            Column::new("Points", ColumnType::Int),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptors {
    pub input_format: String,
    pub output_format: String,
    pub serialization_library: String,
}

impl FormatDescriptors {
    /// Text files holding one JSON object per line
    pub fn json_lines() -> Self {
        Self {
            input_format: "org.apache.hadoop.mapred.TextInputFormat".to_string(),
            output_format: "org.apache.hadoop.hive.ql.io.HiveIgnoreKeyTextOutputFormat".to_string(),
            serialization_library: "org.openx.data.jsonserde.JsonSerDe".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    pub schema: TableSchema,
    pub location: String,
    pub formats: FormatDescriptors,
    pub table_type: String,
}

impl TableDefinition {
    /// Player table pointing at the configured raw-data prefix
    pub fn players(config: &LakeConfig) -> Self {
        Self {
            name: config.table.clone(),
            schema: player_schema(),
            location: config.table_location(),
            formats: FormatDescriptors::json_lines(),
            table_type: EXTERNAL_TABLE.to_string(),
        }
    }
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns `LakeError::AlreadyExists` when the database is present.
    async fn create_database(&self, name: &str, description: &str) -> Result<()>;

    /// Returns `LakeError::AlreadyExists` when the table is present.
    async fn create_table(&self, database: &str, table: &TableDefinition) -> Result<()>;
}

pub async fn ensure_database(catalog: &dyn CatalogService, name: &str) -> Result<Provisioned> {
    let description = "Glue database for NBA sports analytics.";
    let outcome = reclassify_conflict(catalog.create_database(name, description).await)?;
    match outcome {
        Provisioned::Created => info!("Glue database '{}' created successfully.", name),
        Provisioned::AlreadyExisted => info!("Glue database '{}' already exists.", name),
    }
    Ok(outcome)
}

pub async fn ensure_table(
    catalog: &dyn CatalogService,
    database: &str,
    table: &TableDefinition,
) -> Result<Provisioned> {
    let outcome = reclassify_conflict(catalog.create_table(database, table).await)?;
    match outcome {
        Provisioned::Created => info!(
            "Glue table '{}' created successfully at {}.",
            table.name, table.location
        ),
        Provisioned::AlreadyExisted => info!("Glue table '{}' already exists.", table.name),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_config() -> LakeConfig {
        let mut config = LakeConfig::from_lookup(|_| None).unwrap();
        config.bucket = "demo-lake".to_string();
        config.table = "players".to_string();
        config
    }

    #[test]
    fn test_player_schema_columns() {
        let schema = player_schema();
        assert_eq!(schema.len(), 6);
        assert_eq!(
            schema.column_names(),
            vec!["PlayerID", "FirstName", "LastName", "Team", "Position", "Points"]
        );
        assert_eq!(schema.columns[0].column_type, ColumnType::Int);
        assert_eq!(schema.columns[5].column_type, ColumnType::Int);
        assert!(schema.columns[1..5]
            .iter()
            .all(|c| c.column_type == ColumnType::String));
    }

    #[test]
    fn test_table_definition_points_at_upload_prefix() {
        let config = demo_config();
        let table = TableDefinition::players(&config);

        assert_eq!(table.name, "players");
        assert_eq!(table.location, "s3://demo-lake/raw-data/");
        assert!(format!("s3://{}/{}", config.bucket, config.object_key()).starts_with(&table.location));
        assert_eq!(table.formats.serialization_library, "org.openx.data.jsonserde.JsonSerDe");
        assert_eq!(table.table_type, EXTERNAL_TABLE);
    }

    #[tokio::test]
    async fn test_ensure_database_and_table_idempotent() {
        let catalog = MemoryCatalog::new();
        let table = TableDefinition::players(&demo_config());

        assert_eq!(ensure_database(&catalog, "demo_db").await.unwrap(), Provisioned::Created);
        assert_eq!(
            ensure_database(&catalog, "demo_db").await.unwrap(),
            Provisioned::AlreadyExisted
        );
        assert_eq!(
            ensure_table(&catalog, "demo_db", &table).await.unwrap(),
            Provisioned::Created
        );
        assert_eq!(
            ensure_table(&catalog, "demo_db", &table).await.unwrap(),
            Provisioned::AlreadyExisted
        );
    }
}
