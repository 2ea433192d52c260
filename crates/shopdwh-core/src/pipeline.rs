use std::fmt;
use std::sync::Arc;

use polars::prelude::DataFrame;

use crate::clients::{ClientError, DestinationClient, LoadAck, SourceClient};
use crate::credentials::Credentials;
use crate::error::{PipelineError, Result};
use crate::observer::PipelineObserver;
use crate::registry::{registry, DestinationTable, TransformRegistry};
use crate::table_ref::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct SourceEndpoint {
    pub table: TableRef,
    pub client: Arc<dyn SourceClient>,
    pub credentials: Credentials,
}

#[derive(Clone)]
pub struct DestinationEndpoint {
    pub table: TableRef,
    pub client: Arc<dyn DestinationClient>,
    pub credentials: Credentials,
}

/// One source table feeding one warehouse table.
///
/// The three stages are independent calls; the caller hands each stage's
/// output to the next. Nothing is kept between calls.
pub struct Pipeline {
    source: SourceEndpoint,
    destination: DestinationEndpoint,
    target: DestinationTable,
    registry: &'static TransformRegistry,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    /// Fails with [`PipelineError::UnknownDestination`] when the destination's
    /// table name has no registered transform.
    pub fn new(
        source: SourceEndpoint,
        destination: DestinationEndpoint,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Self> {
        let registry = registry();
        let target = registry.lookup(destination.table.table())?.destination;
        Ok(Self {
            source,
            destination,
            target,
            registry,
            observer,
        })
    }

    pub fn source_table(&self) -> &TableRef {
        &self.source.table
    }

    pub fn destination_table(&self) -> &TableRef {
        &self.destination.table
    }

    pub fn target(&self) -> DestinationTable {
        self.target
    }

    /// Full read of the source table.
    pub fn extract(&self) -> Result<DataFrame> {
        let table = &self.source.table;
        self.observe(Stage::Extract, table, || {
            self.source
                .client
                .execute_full_scan(table, &self.source.credentials)
                .map_err(|source| PipelineError::SourceUnavailable {
                    table: table.clone(),
                    source,
                })
        })
    }

    /// Applies the destination's rule. `rows` is left untouched.
    pub fn transform(&self, rows: &DataFrame) -> Result<DataFrame> {
        self.observe(Stage::Transform, &self.destination.table, || {
            self.registry.apply_to(self.target, rows)
        })
    }

    /// Replaces the whole destination table with `rows`.
    pub fn load(&self, rows: &DataFrame) -> Result<LoadAck> {
        let table = &self.destination.table;
        self.observe(Stage::Load, table, || {
            self.destination
                .client
                .replace_table(table, rows, &self.destination.credentials)
                .map_err(|err| match err {
                    ClientError::SchemaConflict(message) => PipelineError::SchemaConflict {
                        table: table.clone(),
                        message,
                    },
                    source => PipelineError::DestinationUnavailable {
                        table: table.clone(),
                        source,
                    },
                })
        })
    }

    /// Extract, transform and load in order; the first failure ends the run.
    pub fn run(&self) -> Result<LoadAck> {
        let raw = self.extract()?;
        let shaped = self.transform(&raw)?;
        self.load(&shaped)
    }

    fn observe<T: RowCount>(
        &self,
        stage: Stage,
        table: &TableRef,
        run_stage: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.observer.stage_started(stage, table);
        let outcome = run_stage();
        match &outcome {
            Ok(value) => self.observer.stage_completed(stage, table, value.row_count()),
            Err(err) => self.observer.stage_failed(stage, table, err),
        }
        outcome
    }
}

trait RowCount {
    fn row_count(&self) -> usize;
}

impl RowCount for DataFrame {
    fn row_count(&self) -> usize {
        self.height()
    }
}

impl RowCount for LoadAck {
    fn row_count(&self) -> usize {
        self.rows_written
    }
}
