use std::sync::{Arc, Mutex};

use anyhow::Result;
use polars::prelude::*;
use shopdwh_core::clients::{MemoryDestination, MemorySource};
use shopdwh_core::observer::{NoopObserver, PipelineObserver};
use shopdwh_core::transforms::TransformError;
use shopdwh_core::{
    Credentials, DestinationEndpoint, DestinationTable, Pipeline, PipelineError, SourceEndpoint,
    Stage, TableRef,
};

fn table(value: &str) -> TableRef {
    value.parse().expect("valid table ref")
}

fn orders() -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new("orderNumber".into(), [10100i64, 10101, 10102]).into(),
        Series::new("orderDate".into(), ["2003-01-06", "2003-01-09", "2003-01-10"]).into(),
        Series::new("status".into(), ["Shipped", "Shipped", "Shipped"]).into(),
    ])?)
}

fn pipeline(
    source: Arc<MemorySource>,
    destination: Arc<MemoryDestination>,
    dest_table: &str,
    observer: Arc<dyn PipelineObserver>,
) -> Result<Pipeline, PipelineError> {
    Pipeline::new(
        SourceEndpoint {
            table: table("shop_dataset.orders"),
            client: source,
            credentials: Credentials::new("postgres://reader@source/shop"),
        },
        DestinationEndpoint {
            table: table(dest_table),
            client: destination,
            credentials: Credentials::new("postgres://writer@dwh/shop"),
        },
        observer,
    )
}

fn orders_source() -> Result<Arc<MemorySource>> {
    Ok(Arc::new(
        MemorySource::new().with_table(table("shop_dataset.orders"), orders()?),
    ))
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(Stage, &'static str, Option<usize>)>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<(Stage, &'static str, Option<usize>)> {
        self.events.lock().expect("lock").clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage, _table: &TableRef) {
        self.events.lock().expect("lock").push((stage, "started", None));
    }

    fn stage_completed(&self, stage: Stage, _table: &TableRef, rows: usize) {
        self.events
            .lock()
            .expect("lock")
            .push((stage, "completed", Some(rows)));
    }

    fn stage_failed(&self, stage: Stage, _table: &TableRef, _error: &PipelineError) {
        self.events.lock().expect("lock").push((stage, "failed", None));
    }
}

#[test]
fn run_loads_the_date_dimension() -> Result<()> {
    let destination = Arc::new(MemoryDestination::new());
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline(
        orders_source()?,
        destination.clone(),
        "shop_dwh.Dim_Date",
        observer.clone(),
    )?;
    assert_eq!(pipeline.target(), DestinationTable::DimDate);

    let ack = pipeline.run()?;

    assert_eq!(ack.table, table("shop_dwh.Dim_Date"));
    assert_eq!(ack.rows_written, 5);
    let stored = destination
        .table(&table("shop_dwh.Dim_Date"))
        .expect("table written");
    assert_eq!(stored.height(), 5);

    assert_eq!(
        observer.events(),
        vec![
            (Stage::Extract, "started", None),
            (Stage::Extract, "completed", Some(3)),
            (Stage::Transform, "started", None),
            (Stage::Transform, "completed", Some(5)),
            (Stage::Load, "started", None),
            (Stage::Load, "completed", Some(5)),
        ]
    );
    Ok(())
}

#[test]
fn stages_can_be_driven_one_at_a_time() -> Result<()> {
    let destination = Arc::new(MemoryDestination::new());
    let pipeline = pipeline(
        orders_source()?,
        destination.clone(),
        "shop_dwh.Fact_Sales",
        Arc::new(NoopObserver),
    )?;

    let raw = pipeline.extract()?;
    let before = raw.clone();
    let shaped = pipeline.transform(&raw)?;
    assert!(raw.equals_missing(&before));
    assert!(shaped.equals_missing(&raw));

    let ack = pipeline.load(&shaped)?;
    assert_eq!(ack.rows_written, 3);
    Ok(())
}

#[test]
fn reload_replaces_previous_contents() -> Result<()> {
    let destination = Arc::new(MemoryDestination::new());
    let pipeline = pipeline(
        orders_source()?,
        destination.clone(),
        "shop_dwh.Fact_Sales",
        Arc::new(NoopObserver),
    )?;

    pipeline.run()?;
    let smaller = orders()?.head(Some(1));
    pipeline.load(&smaller)?;

    let stored = destination
        .table(&table("shop_dwh.Fact_Sales"))
        .expect("table written");
    assert_eq!(stored.height(), 1);
    Ok(())
}

#[test]
fn unknown_destination_fails_at_construction() -> Result<()> {
    let err = pipeline(
        orders_source()?,
        Arc::new(MemoryDestination::new()),
        "shop_dwh.Dim_Store",
        Arc::new(NoopObserver),
    )
    .err()
    .expect("no transform for Dim_Store");
    assert!(matches!(err, PipelineError::UnknownDestination { ref name } if name == "Dim_Store"));
    Ok(())
}

#[test]
fn missing_source_table_is_source_unavailable() -> Result<()> {
    let observer = Arc::new(RecordingObserver::default());
    let pipeline = pipeline(
        Arc::new(MemorySource::new()),
        Arc::new(MemoryDestination::new()),
        "shop_dwh.Dim_Date",
        observer.clone(),
    )?;

    let err = pipeline.run().expect_err("empty source");
    assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    assert!(err.is_transient());
    assert_eq!(err.stage(), Some(Stage::Extract));
    assert_eq!(
        observer.events(),
        vec![
            (Stage::Extract, "started", None),
            (Stage::Extract, "failed", None),
        ]
    );
    Ok(())
}

#[test]
fn transform_failure_leaves_destination_untouched() -> Result<()> {
    let empty = orders()?.head(Some(0));
    let source = Arc::new(MemorySource::new().with_table(table("shop_dataset.orders"), empty));
    let destination = Arc::new(MemoryDestination::new());
    let pipeline = pipeline(
        source,
        destination.clone(),
        "shop_dwh.Dim_Date",
        Arc::new(NoopObserver),
    )?;

    let err = pipeline.run().expect_err("no order dates");
    assert!(matches!(
        err,
        PipelineError::Transform(TransformError::EmptyDateRange)
    ));
    assert_eq!(err.stage(), Some(Stage::Transform));
    assert!(destination.table(&table("shop_dwh.Dim_Date")).is_none());
    Ok(())
}

#[test]
fn shape_mismatch_is_a_schema_conflict() -> Result<()> {
    let destination = Arc::new(
        MemoryDestination::new()
            .with_fixed_schema(table("shop_dwh.Fact_Sales"), ["orderNumber", "status"]),
    );
    let pipeline = pipeline(
        orders_source()?,
        destination.clone(),
        "shop_dwh.Fact_Sales",
        Arc::new(NoopObserver),
    )?;

    let err = pipeline.run().expect_err("orderDate is not expected");
    assert!(matches!(err, PipelineError::SchemaConflict { .. }));
    assert!(!err.is_transient());
    assert!(destination.table(&table("shop_dwh.Fact_Sales")).is_none());
    Ok(())
}

#[test]
fn credentials_never_reach_error_text() -> Result<()> {
    let pipeline = pipeline(
        Arc::new(MemorySource::new()),
        Arc::new(MemoryDestination::new()),
        "shop_dwh.Dim_Date",
        Arc::new(NoopObserver),
    )?;
    let err = pipeline.run().expect_err("empty source");
    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("reader@source"));
    Ok(())
}
