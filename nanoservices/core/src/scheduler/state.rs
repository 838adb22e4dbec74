use crate::pipeline::{RunError, RunReport, Stage};

/// Status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Status of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Waiting,
    Running,
    Retrying,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Waiting => "waiting",
            StageStatus::Running => "running",
            StageStatus::Retrying => "retrying",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// In-memory state for a single pipeline run.
#[derive(Debug)]
pub struct RunState {
    pub id: String,
    pub pipeline: String,
    pub status: RunStatus,
    pub stages: Vec<(Stage, StageStatus)>,
    pub started_at: std::time::Instant,
}

impl RunState {
    pub fn new(id: String, pipeline: String) -> Self {
        Self {
            id,
            pipeline,
            status: RunStatus::Running,
            stages: Stage::ALL.iter().map(|s| (*s, StageStatus::Waiting)).collect(),
            started_at: std::time::Instant::now(),
        }
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| *status)
            .unwrap_or(StageStatus::Waiting)
    }

    fn set(&mut self, stage: Stage, status: StageStatus) {
        if let Some(entry) = self.stages.iter_mut().find(|(s, _)| *s == stage) {
            entry.1 = status;
        }
    }

    pub fn stage_started(&mut self, stage: Stage) {
        self.set(stage, StageStatus::Running);
    }

    /// Record the outcome of one attempt and return the resulting stage status.
    pub fn attempt_finished(&mut self, stage: Stage, failed: bool, will_retry: bool) -> StageStatus {
        let status = match (failed, will_retry) {
            (false, _) => StageStatus::Completed,
            (true, true) => StageStatus::Retrying,
            (true, false) => StageStatus::Failed,
        };
        self.set(stage, status);
        status
    }

    /// Close the run. Stages that never started are marked skipped and
    /// returned so they can be persisted.
    pub fn finish(&mut self, outcome: &Result<RunReport, RunError>) -> Vec<Stage> {
        self.status = match outcome {
            Ok(_) => RunStatus::Completed,
            Err(RunError::StageFailed { .. }) => RunStatus::Failed,
            Err(RunError::Cancelled(_)) => RunStatus::Cancelled,
        };

        let mut skipped = Vec::new();
        for (stage, status) in self.stages.iter_mut() {
            if matches!(status, StageStatus::Waiting | StageStatus::Retrying) {
                *status = StageStatus::Skipped;
                skipped.push(*stage);
            }
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sekolah_utils::error::Error;

    fn report() -> RunReport {
        RunReport {
            records_extracted: 3,
            rows_loaded: 1,
            table: "hijir.target_table".into(),
            rejected: Vec::new(),
        }
    }

    #[test]
    fn stages_start_waiting() {
        let state = RunState::new("run-1".into(), "test".into());
        assert_eq!(state.status, RunStatus::Running);
        for stage in Stage::ALL {
            assert_eq!(state.stage_status(stage), StageStatus::Waiting);
        }
    }

    #[test]
    fn completed_run_has_no_skipped_stages() {
        let mut state = RunState::new("run-1".into(), "test".into());
        for stage in Stage::ALL {
            state.stage_started(stage);
            state.attempt_finished(stage, false, false);
        }
        let skipped = state.finish(&Ok(report()));
        assert!(skipped.is_empty());
        assert_eq!(state.status, RunStatus::Completed);
    }

    #[test]
    fn failure_skips_later_stages() {
        let mut state = RunState::new("run-1".into(), "test".into());
        state.stage_started(Stage::Extract);
        assert_eq!(state.attempt_finished(Stage::Extract, true, true), StageStatus::Retrying);
        assert_eq!(state.attempt_finished(Stage::Extract, true, false), StageStatus::Failed);

        let skipped = state.finish(&Err(RunError::StageFailed {
            stage: Stage::Extract,
            attempts: 2,
            source: Error::NotFound("data.json".into()),
        }));
        assert_eq!(skipped, vec![Stage::Transform, Stage::Load]);
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.stage_status(Stage::Load), StageStatus::Skipped);
    }

    #[test]
    fn cancellation_during_backoff_skips_retrying_stage() {
        let mut state = RunState::new("run-1".into(), "test".into());
        state.stage_started(Stage::Extract);
        state.attempt_finished(Stage::Extract, false, false);
        state.stage_started(Stage::Transform);
        state.attempt_finished(Stage::Transform, true, true);

        let skipped = state.finish(&Err(RunError::Cancelled(Stage::Transform)));
        assert_eq!(skipped, vec![Stage::Transform, Stage::Load]);
        assert_eq!(state.status, RunStatus::Cancelled);
        assert_eq!(state.stage_status(Stage::Extract), StageStatus::Completed);
    }
}
