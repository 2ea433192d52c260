// crates/shopdwh-core/src/error.rs

use thiserror::Error;

use crate::clients::ClientError;
use crate::pipeline::Stage;
use crate::table_ref::TableRef;
use crate::transforms::TransformError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source {table} unavailable: {source}")]
    SourceUnavailable {
        table: TableRef,
        #[source]
        source: ClientError,
    },

    #[error("destination {table} unavailable: {source}")]
    DestinationUnavailable {
        table: TableRef,
        #[source]
        source: ClientError,
    },

    #[error("no transform registered for destination '{name}'")]
    UnknownDestination { name: String },

    #[error("destination {table} rejected the row-set shape: {message}")]
    SchemaConflict { table: TableRef, message: String },

    #[error("invalid table reference '{value}': expected `schema.table`")]
    InvalidTableRef { value: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl PipelineError {
    /// Failures another attempt could plausibly clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::SourceUnavailable { .. } | PipelineError::DestinationUnavailable { .. }
        )
    }

    /// Stage that raised the error, if it belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::SourceUnavailable { .. } => Some(Stage::Extract),
            PipelineError::Transform(_) | PipelineError::UnknownDestination { .. } => {
                Some(Stage::Transform)
            }
            PipelineError::DestinationUnavailable { .. } | PipelineError::SchemaConflict { .. } => {
                Some(Stage::Load)
            }
            PipelineError::InvalidTableRef { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
