use super::{CatalogService, TableDefinition};
use crate::error::{LakeError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Database {
    description: String,
    tables: BTreeMap<String, TableDefinition>,
}

/// In-process catalog. Clones share the same databases.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    databases: Arc<Mutex<HashMap<String, Database>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.databases.lock().unwrap().contains_key(name)
    }

    pub fn database_description(&self, name: &str) -> Option<String> {
        self.databases
            .lock()
            .unwrap()
            .get(name)
            .map(|db| db.description.clone())
    }

    pub fn table(&self, database: &str, table: &str) -> Option<TableDefinition> {
        self.databases
            .lock()
            .unwrap()
            .get(database)
            .and_then(|db| db.tables.get(table).cloned())
    }
}

#[async_trait]
impl CatalogService for MemoryCatalog {
    async fn create_database(&self, name: &str, description: &str) -> Result<()> {
        let mut databases = self.databases.lock().unwrap();
        if databases.contains_key(name) {
            return Err(LakeError::already_exists(format!("database {}", name)));
        }
        databases.insert(
            name.to_string(),
            Database {
                description: description.to_string(),
                tables: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn create_table(&self, database: &str, table: &TableDefinition) -> Result<()> {
        let mut databases = self.databases.lock().unwrap();
        let db = databases.get_mut(database).ok_or_else(|| {
            LakeError::provider("Glue", format!("EntityNotFoundException: database {} not found", database))
        })?;
        if db.tables.contains_key(&table.name) {
            return Err(LakeError::already_exists(format!("table {}.{}", database, table.name)));
        }
        db.tables.insert(table.name.clone(), table.clone());
        Ok(())
    }
}
