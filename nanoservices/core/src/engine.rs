use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::builder::{BuildError, PipelineBuilder};
use crate::config::types::FlowConfig;
use crate::events::bus::EventBus;
use crate::events::daily::spawn_daily_trigger;
use crate::events::interval::spawn_interval_trigger;
use crate::events::trigger::{Trigger, TriggerEvent};
use crate::pipeline::PipelineDef;
use crate::scheduler::runner::{self, execute_run, RunFinished};
use crate::store::db::Store;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("run history store: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("run history directory: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Top-level orchestrator. Users register pipelines and call run().
pub struct SekolahFlow {
    pipelines: Vec<(Trigger, PipelineDef)>,
    history_path: Option<PathBuf>,
}

impl Default for SekolahFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SekolahFlow {
    pub fn new() -> Self {
        Self {
            pipelines: Vec::new(),
            history_path: None,
        }
    }

    /// Engine with the single pipeline described by `config`.
    pub fn from_config(config: &FlowConfig) -> Result<Self, EngineError> {
        let (trigger, def) = PipelineBuilder::from_config(config)?.build()?;
        let mut engine = Self::new().add_pipeline(trigger, def);
        if let Some(path) = &config.history.path {
            engine = engine.history_path(path.clone());
        }
        Ok(engine)
    }

    /// Set the path for the run history database. Defaults to in-memory.
    pub fn history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    /// Add a pipeline (trigger + definition).
    pub fn add_pipeline(mut self, trigger: Trigger, def: PipelineDef) -> Self {
        self.pipelines.push((trigger, def));
        self
    }

    fn open_store(&self) -> Result<Store, EngineError> {
        let store = match &self.history_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Store::open(path)?
            }
            None => Store::in_memory()?,
        };

        // Crash recovery
        let crashed = store.mark_inflight_as_crashed()?;
        if crashed > 0 {
            tracing::warn!(count = crashed, "marked in-flight runs as crashed from previous session");
        }
        Ok(store)
    }

    /// Run the orchestrator until Ctrl-C.
    pub async fn run(self) -> Result<(), EngineError> {
        let shutdown = tokio::signal::ctrl_c();
        self.run_with_shutdown(async { let _ = shutdown.await; }).await
    }

    /// Run with a custom shutdown signal (useful for testing).
    pub async fn run_with_shutdown<F: std::future::Future>(self, shutdown: F) -> Result<(), EngineError> {
        let store = Arc::new(Mutex::new(self.open_store()?));

        let bus = EventBus::new(256);
        let (event_tx, event_rx) = bus.split();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut trigger_handles = Vec::new();
        let mut pipeline_defs = HashMap::new();

        for (trigger, def) in self.pipelines {
            let pipeline_name = def.name.clone();
            match &trigger {
                Trigger::Interval(duration) => {
                    trigger_handles.push(spawn_interval_trigger(
                        pipeline_name.clone(),
                        *duration,
                        event_tx.clone(),
                    ));
                }
                Trigger::Daily { at } => {
                    trigger_handles.push(spawn_daily_trigger(
                        pipeline_name.clone(),
                        *at,
                        event_tx.clone(),
                    ));
                }
                Trigger::Manual => {
                    let _ = event_tx.send(TriggerEvent::now(pipeline_name.clone(), Trigger::Manual)).await;
                }
            }
            tracing::info!(pipeline = %pipeline_name, trigger = trigger.kind(), "pipeline registered");
            pipeline_defs.insert(pipeline_name, Arc::new(def));
        }

        // Drop our copy of the sender so scheduler sees channel close on shutdown
        drop(event_tx);

        let scheduler_handle = tokio::spawn(runner::run_scheduler(
            event_rx,
            pipeline_defs,
            store,
            shutdown_rx,
        ));

        shutdown.await;

        let _ = shutdown_tx.send(true);
        for handle in trigger_handles {
            handle.abort();
        }
        let _ = scheduler_handle.await;

        tracing::info!("sekolah_flow shutdown complete");
        Ok(())
    }

    /// Run every registered pipeline once, now, one after another. Ctrl-C
    /// cancels at the next stage boundary.
    pub async fn run_once(self) -> Result<Vec<RunFinished>, EngineError> {
        let store = Arc::new(Mutex::new(self.open_store()?));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(true);
            }
        });

        let mut finished = Vec::with_capacity(self.pipelines.len());
        for (_, def) in self.pipelines {
            let run_id = Uuid::new_v4().to_string();
            finished.push(
                execute_run(Arc::new(def), run_id, Trigger::Manual, store.clone(), shutdown_rx.clone()).await,
            );
        }

        ctrl_c.abort();
        Ok(finished)
    }
}
