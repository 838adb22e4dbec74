//! One pipeline run: extract, then transform, then load.
//!
//! Each stage returns its value to [`run_stages`], which passes it straight to
//! the next stage. Nothing is shared between stages besides those arguments.

pub mod retry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use sekolah_utils::error::Error;
use sekolah_utils::SekolahResult;
use tokio::sync::watch;

use crate::destinations::traits::Destination;
use crate::sources::traits::Source;
use crate::transforms::traits::{RejectedRecord, Transform};
use retry::{wait_or_shutdown, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Transform, Stage::Load];

    pub fn as_str(&self) -> &'static str {
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

/// A registered pipeline: its three stages and how to run them.
pub struct PipelineDef {
    pub name: String,
    pub source: Arc<dyn Source>,
    pub transform: Arc<dyn Transform>,
    pub destination: Arc<dyn Destination>,
    pub retry: RetryPolicy,
    /// Triggers dated before this day are ignored.
    pub start_date: Option<NaiveDate>,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub records_extracted: usize,
    pub rows_loaded: usize,
    pub table: String,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{stage} stage failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: Stage,
        attempts: u32,
        #[source]
        source: Error,
    },
    #[error("run cancelled before {0} stage")]
    Cancelled(Stage),
}

impl RunError {
    pub fn stage(&self) -> Stage {
        match self {
            RunError::StageFailed { stage, .. } => *stage,
            RunError::Cancelled(stage) => *stage,
        }
    }
}

/// One finished attempt of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttempt {
    pub stage: Stage,
    pub attempt: u32,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Set when the stage failed and another attempt will follow.
    pub will_retry: bool,
}

/// Observes stage attempts as they happen (run history, tests).
#[async_trait]
pub trait AttemptRecorder: Send + Sync {
    async fn attempt_started(&self, _run_id: &str, _stage: Stage, _attempt: u32) {}

    async fn attempt_finished(&self, run_id: &str, attempt: &StageAttempt);
}

/// Recorder that drops everything.
pub struct NoopRecorder;

#[async_trait]
impl AttemptRecorder for NoopRecorder {
    async fn attempt_finished(&self, _run_id: &str, _attempt: &StageAttempt) {}
}

struct StageRunner<'a> {
    pipeline: &'a str,
    run_id: &'a str,
    policy: RetryPolicy,
    recorder: &'a dyn AttemptRecorder,
}

impl StageRunner<'_> {
    async fn run<T, F, Fut>(
        &self,
        stage: Stage,
        shutdown: &mut watch::Receiver<bool>,
        mut op: F,
    ) -> Result<T, RunError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SekolahResult<T>>,
    {
        if *shutdown.borrow() {
            return Err(RunError::Cancelled(stage));
        }

        let mut attempt = 1;
        loop {
            self.recorder.attempt_started(self.run_id, stage, attempt).await;
            let started_at = now_rfc3339();
            let start = Instant::now();
            let result = op().await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let will_retry = result.is_err() && attempt <= self.policy.retries;

            self.recorder
                .attempt_finished(self.run_id, &StageAttempt {
                    stage,
                    attempt,
                    started_at,
                    finished_at: now_rfc3339(),
                    duration_ms,
                    error: result.as_ref().err().map(|e| e.to_string()),
                    will_retry,
                })
                .await;

            match result {
                Ok(value) => {
                    tracing::debug!(
                        run = %self.run_id,
                        stage = %stage,
                        attempt,
                        duration_ms,
                        "stage completed"
                    );
                    return Ok(value);
                }
                Err(e) if will_retry => {
                    tracing::warn!(
                        run = %self.run_id,
                        stage = %stage,
                        attempt,
                        kind = e.kind(),
                        error = %e,
                        retry_in_secs = self.policy.delay.as_secs(),
                        "stage failed, retrying"
                    );
                    crate::metrics::inc_retry(self.pipeline, stage.as_str());
                    if wait_or_shutdown(self.policy.delay, shutdown).await {
                        return Err(RunError::Cancelled(stage));
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RunError::StageFailed { stage, attempts: attempt, source: e });
                }
            }
        }
    }
}

/// Run the three stages in order, retrying each as a whole per the
/// pipeline's policy. Shutdown is honoured between stages and during retry
/// back-off, never in the middle of a stage.
pub async fn run_stages(
    def: &PipelineDef,
    run_id: &str,
    recorder: &dyn AttemptRecorder,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<RunReport, RunError> {
    let runner = StageRunner {
        pipeline: &def.name,
        run_id,
        policy: def.retry,
        recorder,
    };

    let source = def.source.as_ref();
    let records = runner.run(Stage::Extract, shutdown, move || source.extract()).await?;

    let transform = def.transform.as_ref();
    let records_ref = &records;
    let output = runner
        .run(Stage::Transform, shutdown, move || transform.transform(records_ref))
        .await?;

    let destination = def.destination.as_ref();
    let frame = &output.frame;
    let load = runner.run(Stage::Load, shutdown, move || destination.load(frame)).await?;

    Ok(RunReport {
        records_extracted: records.len(),
        rows_loaded: load.rows,
        table: load.table,
        rejected: output.rejected,
    })
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
