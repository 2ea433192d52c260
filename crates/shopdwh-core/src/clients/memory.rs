use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use polars::prelude::DataFrame;

use super::{ClientError, DestinationClient, LoadAck, SourceClient};
use crate::credentials::Credentials;
use crate::table_ref::TableRef;

/// In-process source holding whole tables.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    tables: HashMap<TableRef, DataFrame>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableRef, rows: DataFrame) -> Self {
        self.tables.insert(table, rows);
        self
    }
}

impl SourceClient for MemorySource {
    fn execute_full_scan(
        &self,
        table: &TableRef,
        _credentials: &Credentials,
    ) -> Result<DataFrame, ClientError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| ClientError::TableNotFound(table.clone()))
    }
}

/// In-process destination. Tables registered with a fixed schema reject
/// row-sets whose column names differ.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: Mutex<HashMap<TableRef, DataFrame>>,
    fixed_schemas: HashMap<TableRef, Vec<String>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixed_schema<I, S>(mut self, table: TableRef, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_schemas
            .insert(table, columns.into_iter().map(Into::into).collect());
        self
    }

    /// Current contents of `table`, if it has been loaded.
    pub fn table(&self, table: &TableRef) -> Option<DataFrame> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }
}

impl DestinationClient for MemoryDestination {
    fn replace_table(
        &self,
        table: &TableRef,
        rows: &DataFrame,
        _credentials: &Credentials,
    ) -> Result<LoadAck, ClientError> {
        if let Some(expected) = self.fixed_schemas.get(table) {
            let actual: Vec<&str> = rows
                .get_column_names()
                .into_iter()
                .map(|name| name.as_str())
                .collect();
            if actual != *expected {
                return Err(ClientError::SchemaConflict(format!(
                    "expected columns {expected:?}, got {actual:?}"
                )));
            }
        }

        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.clone(), rows.clone());

        Ok(LoadAck {
            table: table.clone(),
            rows_written: rows.height(),
        })
    }
}
