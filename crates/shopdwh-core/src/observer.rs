use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::{info, info_span, warn, Span};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::Stage;
use crate::table_ref::TableRef;

/// Receives stage events from a [`crate::pipeline::Pipeline`].
///
/// Purely observational: nothing an observer does can change how a stage
/// ends.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, stage: Stage, table: &TableRef);
    fn stage_completed(&self, stage: Stage, table: &TableRef, rows: usize);
    fn stage_failed(&self, stage: Stage, table: &TableRef, error: &PipelineError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn stage_started(&self, _stage: Stage, _table: &TableRef) {}
    fn stage_completed(&self, _stage: Stage, _table: &TableRef, _rows: usize) {}
    fn stage_failed(&self, _stage: Stage, _table: &TableRef, _error: &PipelineError) {}
}

/// Emits `tracing` events inside a span tagged with a fresh run id.
#[derive(Debug)]
pub struct TracingObserver {
    run_id: Uuid,
    span: Span,
    stage_started_at: Mutex<Option<Instant>>,
}

impl TracingObserver {
    pub fn for_run(pipeline: &str) -> Self {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", pipeline = pipeline, run_id = %run_id);
        Self {
            run_id,
            span,
            stage_started_at: Mutex::new(None),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn elapsed_ms(&self) -> Option<u64> {
        self.stage_started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|started| started.elapsed().as_millis() as u64)
    }
}

impl PipelineObserver for TracingObserver {
    fn stage_started(&self, stage: Stage, table: &TableRef) {
        *self
            .stage_started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        let _entered = self.span.enter();
        info!(stage = stage.as_str(), table = %table, "Stage started");
    }

    fn stage_completed(&self, stage: Stage, table: &TableRef, rows: usize) {
        let elapsed_ms = self.elapsed_ms();
        let _entered = self.span.enter();
        info!(stage = stage.as_str(), table = %table, rows, elapsed_ms, "Stage completed");
    }

    fn stage_failed(&self, stage: Stage, table: &TableRef, error: &PipelineError) {
        let elapsed_ms = self.elapsed_ms();
        let _entered = self.span.enter();
        warn!(stage = stage.as_str(), table = %table, elapsed_ms, error = %error, "Stage failed");
    }
}
