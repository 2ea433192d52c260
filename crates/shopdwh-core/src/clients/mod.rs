//! Collaborator clients behind the extract and load stages.

use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;

use crate::credentials::Credentials;
use crate::rowset::RowSetError;
use crate::table_ref::TableRef;

pub mod memory;
pub mod parquet;
#[cfg(feature = "runtime")]
pub mod postgres;

pub use memory::{MemoryDestination, MemorySource};
pub use parquet::ParquetDirectory;
#[cfg(feature = "runtime")]
pub use postgres::PostgresClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("table {0} does not exist")]
    TableNotFound(TableRef),

    #[error("query failed: {0}")]
    Query(String),

    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    #[error(transparent)]
    RowSet(#[from] RowSetError),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Acknowledgment of a full-replace write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAck {
    pub table: TableRef,
    pub rows_written: usize,
}

/// Reads a whole table. Implementations must not modify the source.
pub trait SourceClient: Send + Sync {
    fn execute_full_scan(
        &self,
        table: &TableRef,
        credentials: &Credentials,
    ) -> Result<DataFrame, ClientError>;
}

/// Replaces the entire contents of a table; never appends or merges.
pub trait DestinationClient: Send + Sync {
    fn replace_table(
        &self,
        table: &TableRef,
        rows: &DataFrame,
        credentials: &Credentials,
    ) -> Result<LoadAck, ClientError>;
}
