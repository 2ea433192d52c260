use std::sync::Arc;
use std::thread;
use std::time::Duration;

use polars::prelude::DataFrame;
use shopdwh_core::config::RetryConfig;
use shopdwh_core::observer::TracingObserver;
use shopdwh_core::{DestinationEndpoint, LoadAck, Pipeline, PipelineError, SourceEndpoint};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            retries: config.retries,
            delay: config.delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    /// Extract and transform only; the destination is never written.
    DryRun,
}

#[derive(Debug)]
pub enum RunOutcome {
    Loaded(LoadAck),
    Preview(DataFrame),
}

/// A configured pipeline, ready to be scheduled.
#[derive(Clone)]
pub struct PipelineJob {
    pub name: String,
    pub source: SourceEndpoint,
    pub destination: DestinationEndpoint,
}

/// Runs `job`, retrying transient failures up to `policy.retries` times.
///
/// Every attempt starts over from extract with a fresh run id.
pub fn run_job(
    job: &PipelineJob,
    mode: RunMode,
    policy: &RetryPolicy,
) -> Result<RunOutcome, PipelineError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match run_attempt(job, mode) {
            Ok(outcome) => return Ok(outcome),
            Err(err) if err.is_transient() && attempt <= policy.retries => {
                warn!(
                    pipeline = job.name.as_str(),
                    attempt,
                    retry_in_secs = policy.delay.as_secs(),
                    error = %err,
                    "Pipeline attempt failed, retrying"
                );
                thread::sleep(policy.delay);
            }
            Err(err) => return Err(err),
        }
    }
}

fn run_attempt(job: &PipelineJob, mode: RunMode) -> Result<RunOutcome, PipelineError> {
    let observer = Arc::new(TracingObserver::for_run(&job.name));
    let run_id = observer.run_id();
    let pipeline = Pipeline::new(job.source.clone(), job.destination.clone(), observer)?;

    let raw = pipeline.extract()?;
    let shaped = pipeline.transform(&raw)?;
    match mode {
        RunMode::Full => {
            let ack = pipeline.load(&shaped)?;
            info!(
                pipeline = job.name.as_str(),
                %run_id,
                table = %ack.table,
                rows = ack.rows_written,
                "Pipeline finished"
            );
            Ok(RunOutcome::Loaded(ack))
        }
        RunMode::DryRun => Ok(RunOutcome::Preview(shaped)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use polars::prelude::{Column, NamedFrom, Series};
    use shopdwh_core::clients::{ClientError, MemoryDestination, MemorySource};
    use shopdwh_core::{Credentials, SourceClient, TableRef};

    use super::*;

    /// Fails with a connection error until `failures` calls have been made.
    struct FlakySource {
        inner: MemorySource,
        failures: usize,
        calls: AtomicUsize,
    }

    impl SourceClient for FlakySource {
        fn execute_full_scan(
            &self,
            table: &TableRef,
            credentials: &Credentials,
        ) -> Result<DataFrame, ClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ClientError::Connection("connection refused".into()));
            }
            self.inner.execute_full_scan(table, credentials)
        }
    }

    fn table(value: &str) -> TableRef {
        value.parse().expect("valid table ref")
    }

    fn orders() -> DataFrame {
        let order_number: Column = Series::new("orderNumber".into(), [10100i64, 10101]).into();
        let quantity: Column = Series::new("quantityOrdered".into(), [30i64, 50]).into();
        DataFrame::new(vec![order_number, quantity]).expect("frame")
    }

    fn job(
        source: Arc<FlakySource>,
        destination: Arc<MemoryDestination>,
    ) -> PipelineJob {
        PipelineJob {
            name: "fact_sales".into(),
            source: SourceEndpoint {
                table: table("shop_dataset.orderdetails"),
                client: source,
                credentials: Credentials::new("source"),
            },
            destination: DestinationEndpoint {
                table: table("shop_dwh.Fact_Sales"),
                client: destination,
                credentials: Credentials::new("dest"),
            },
        }
    }

    fn flaky(failures: usize) -> Arc<FlakySource> {
        Arc::new(FlakySource {
            inner: MemorySource::new().with_table(table("shop_dataset.orderdetails"), orders()),
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    fn no_delay(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn transient_failure_is_retried_from_extract() {
        let source = flaky(1);
        let destination = Arc::new(MemoryDestination::new());
        let outcome = run_job(
            &job(source.clone(), destination.clone()),
            RunMode::Full,
            &no_delay(1),
        )
        .expect("second attempt succeeds");

        match outcome {
            RunOutcome::Loaded(ack) => assert_eq!(ack.rows_written, 2),
            RunOutcome::Preview(_) => panic!("expected a load"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(destination.table(&table("shop_dwh.Fact_Sales")).is_some());
    }

    #[test]
    fn retries_are_bounded() {
        let source = flaky(5);
        let destination = Arc::new(MemoryDestination::new());
        let err = run_job(&job(source.clone(), destination), RunMode::Full, &no_delay(1))
            .expect_err("every attempt fails");

        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn schema_conflict_is_not_retried() {
        let source = flaky(0);
        let destination = Arc::new(
            MemoryDestination::new()
                .with_fixed_schema(table("shop_dwh.Fact_Sales"), ["orderNumber"]),
        );
        let err = run_job(&job(source.clone(), destination), RunMode::Full, &no_delay(3))
            .expect_err("shape mismatch");

        assert!(matches!(err, PipelineError::SchemaConflict { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dry_run_never_writes() {
        let destination = Arc::new(MemoryDestination::new());
        let outcome = run_job(&job(flaky(0), destination.clone()), RunMode::DryRun, &no_delay(0))
            .expect("dry run");

        match outcome {
            RunOutcome::Preview(frame) => assert_eq!(frame.height(), 2),
            RunOutcome::Loaded(_) => panic!("dry run must not load"),
        }
        assert!(destination.table(&table("shop_dwh.Fact_Sales")).is_none());
    }
}
