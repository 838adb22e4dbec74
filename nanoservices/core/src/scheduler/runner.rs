use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

use crate::events::trigger::{Trigger, TriggerEvent};
use crate::pipeline::{now_rfc3339, run_stages, AttemptRecorder, PipelineDef, RunError, RunReport, Stage, StageAttempt};
use crate::scheduler::state::{RunState, RunStatus};
use crate::store::db::{RunSummary, StageRunRow, Store};

/// Result of one run, sent back to the scheduler loop.
#[derive(Debug)]
pub struct RunFinished {
    pub run_id: String,
    pub pipeline: String,
    pub status: RunStatus,
    pub outcome: Result<RunReport, RunError>,
}

/// Writes every stage attempt of one run to the history store and keeps the
/// in-memory run state in step.
struct HistoryRecorder {
    store: Arc<Mutex<Store>>,
    state: std::sync::Mutex<RunState>,
}

impl HistoryRecorder {
    fn new(store: Arc<Mutex<Store>>, state: RunState) -> Self {
        Self { store, state: std::sync::Mutex::new(state) }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RunState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    async fn insert_stage(&self, row: StageRunRow) {
        let store = self.store.lock().await;
        if let Err(e) = store.insert_stage_run(&row) {
            tracing::warn!(run = %row.run_id, stage = %row.stage, error = %e, "failed to record stage run");
        }
    }
}

#[async_trait]
impl AttemptRecorder for HistoryRecorder {
    async fn attempt_started(&self, _run_id: &str, stage: Stage, _attempt: u32) {
        self.with_state(|state| state.stage_started(stage));
    }

    async fn attempt_finished(&self, run_id: &str, attempt: &StageAttempt) {
        let status = self.with_state(|state| {
            state.attempt_finished(attempt.stage, attempt.error.is_some(), attempt.will_retry)
        });
        self.insert_stage(StageRunRow {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            stage: attempt.stage.as_str().to_string(),
            attempt: i64::from(attempt.attempt),
            status: status.as_str().to_string(),
            started_at: attempt.started_at.clone(),
            finished_at: Some(attempt.finished_at.clone()),
            duration_ms: Some(attempt.duration_ms as i64),
            error: attempt.error.clone(),
        })
        .await;
    }
}

/// Execute one run of `def` end to end: history rows, stages, metrics, logs.
pub async fn execute_run(
    def: Arc<PipelineDef>,
    run_id: String,
    trigger: Trigger,
    store: Arc<Mutex<Store>>,
    mut shutdown: watch::Receiver<bool>,
) -> RunFinished {
    let pipeline = def.name.clone();
    {
        let store = store.lock().await;
        if let Err(e) = store.insert_pipeline_run(&run_id, &pipeline, trigger.kind(), &now_rfc3339()) {
            tracing::warn!(run = %run_id, error = %e, "failed to record pipeline run start");
        }
    }
    tracing::info!(run = %run_id, pipeline = %pipeline, trigger = trigger.kind(), "pipeline run started");

    let recorder = HistoryRecorder::new(store.clone(), RunState::new(run_id.clone(), pipeline.clone()));
    let outcome = run_stages(&def, &run_id, &recorder, &mut shutdown).await;

    let (status, skipped, duration_ms) = recorder.with_state(|state| {
        let skipped = state.finish(&outcome);
        (state.status, skipped, state.started_at.elapsed().as_millis() as i64)
    });

    let finished_at = now_rfc3339();
    for stage in skipped {
        recorder
            .insert_stage(StageRunRow {
                id: Uuid::new_v4().to_string(),
                run_id: run_id.clone(),
                stage: stage.as_str().to_string(),
                attempt: 0,
                status: "skipped".to_string(),
                started_at: finished_at.clone(),
                finished_at: None,
                duration_ms: None,
                error: None,
            })
            .await;
    }

    let summary = RunSummary {
        status: status.as_str().to_string(),
        finished_at,
        duration_ms,
        rows_loaded: outcome.as_ref().ok().map(|r| r.rows_loaded as i64),
        records_rejected: outcome.as_ref().ok().map(|r| r.rejected.len() as i64),
        error: outcome.as_ref().err().map(|e| e.to_string()),
    };
    {
        let store = store.lock().await;
        if let Err(e) = store.complete_pipeline_run(&run_id, &summary) {
            tracing::warn!(run = %run_id, error = %e, "failed to record pipeline run completion");
        }
    }

    crate::metrics::inc_run(&pipeline, status.as_str());
    crate::metrics::observe_duration(&pipeline, duration_ms as f64);
    match &outcome {
        Ok(report) => {
            crate::metrics::add_rows_loaded(&pipeline, report.rows_loaded);
            crate::metrics::add_rejected(&pipeline, report.rejected.len());
            tracing::info!(
                run = %run_id,
                pipeline = %pipeline,
                extracted = report.records_extracted,
                rows = report.rows_loaded,
                rejected = report.rejected.len(),
                table = %report.table,
                duration_ms,
                "pipeline run finished"
            );
        }
        Err(RunError::Cancelled(stage)) => {
            tracing::warn!(run = %run_id, pipeline = %pipeline, stage = %stage, "pipeline run cancelled");
        }
        Err(e) => {
            crate::metrics::inc_failure(&pipeline, e.stage().as_str());
            tracing::error!(
                run = %run_id,
                pipeline = %pipeline,
                stage = %e.stage(),
                error = %e,
                duration_ms,
                "pipeline run failed"
            );
        }
    }

    RunFinished { run_id, pipeline, status, outcome }
}

/// The scheduler loop. Receives trigger events and starts pipeline runs.
///
/// At most one run per pipeline is active; triggers that arrive while one is
/// in flight are dropped. On shutdown the loop stops taking triggers and
/// waits for active runs, which cancel themselves at the next stage boundary.
/// The loop also ends once every trigger producer is gone and nothing is
/// running.
pub async fn run_scheduler(
    mut event_rx: mpsc::Receiver<TriggerEvent>,
    pipelines: HashMap<String, Arc<PipelineDef>>,
    store: Arc<Mutex<Store>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (done_tx, mut done_rx) = mpsc::channel::<RunFinished>(64);
    // Pipeline name -> id of its active run.
    let mut active_runs: HashMap<String, String> = HashMap::new();
    let mut events_open = true;

    loop {
        if !events_open && active_runs.is_empty() {
            break;
        }
        tokio::select! {
            event = event_rx.recv(), if events_open => {
                let Some(event) = event else {
                    events_open = false;
                    continue;
                };
                let Some(def) = pipelines.get(&event.pipeline) else {
                    tracing::warn!(pipeline = %event.pipeline, "received trigger for unknown pipeline");
                    continue;
                };
                if let Some(start) = def.start_date {
                    if event.fired_at.date_naive() < start {
                        tracing::info!(pipeline = %event.pipeline, start_date = %start, "trigger before start date ignored");
                        continue;
                    }
                }
                if let Some(active) = active_runs.get(&event.pipeline) {
                    tracing::warn!(pipeline = %event.pipeline, active_run = %active, "previous run still active, trigger skipped");
                    continue;
                }

                let run_id = Uuid::new_v4().to_string();
                active_runs.insert(event.pipeline.clone(), run_id.clone());

                let def = def.clone();
                let store = store.clone();
                let shutdown = shutdown_rx.clone();
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let finished = execute_run(def, run_id, event.trigger, store, shutdown).await;
                    let _ = done_tx.send(finished).await;
                });
            }

            Some(finished) = done_rx.recv() => {
                active_runs.remove(&finished.pipeline);
            }

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!(active = active_runs.len(), "scheduler shutting down");
                    break;
                }
            }
        }
    }

    while !active_runs.is_empty() {
        match done_rx.recv().await {
            Some(finished) => {
                active_runs.remove(&finished.pipeline);
            }
            None => break,
        }
    }
}
