use rusqlite::{Connection, params};
use std::path::Path;

/// SQLite-backed store for pipeline run history.
pub struct Store {
    conn: Connection,
}

/// Final values written when a run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub rows_loaded: Option<i64>,
    pub records_rejected: Option<i64>,
    pub error: Option<String>,
}

impl Store {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipeline_runs (
                id TEXT PRIMARY KEY,
                pipeline TEXT NOT NULL,
                trigger_type TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER,
                rows_loaded INTEGER,
                records_rejected INTEGER,
                error TEXT
            );
            CREATE TABLE IF NOT EXISTS stage_runs (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
                stage TEXT NOT NULL,
                attempt INTEGER NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_pipeline ON pipeline_runs(pipeline);
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status);
            CREATE INDEX IF NOT EXISTS idx_stage_runs_run_id ON stage_runs(run_id);"
        )?;
        Ok(())
    }

    /// Record a new pipeline run as started.
    pub fn insert_pipeline_run(
        &self,
        id: &str,
        pipeline: &str,
        trigger_type: &str,
        started_at: &str,
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO pipeline_runs (id, pipeline, trigger_type, status, started_at)
             VALUES (?1, ?2, ?3, 'running', ?4)",
            params![id, pipeline, trigger_type, started_at],
        )?;
        Ok(())
    }

    /// Complete a pipeline run.
    pub fn complete_pipeline_run(&self, id: &str, summary: &RunSummary) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE pipeline_runs
             SET status = ?2, finished_at = ?3, duration_ms = ?4,
                 rows_loaded = ?5, records_rejected = ?6, error = ?7
             WHERE id = ?1",
            params![
                id,
                summary.status,
                summary.finished_at,
                summary.duration_ms,
                summary.rows_loaded,
                summary.records_rejected,
                summary.error,
            ],
        )?;
        Ok(())
    }

    /// Record one stage attempt (or a skipped stage).
    pub fn insert_stage_run(&self, row: &StageRunRow) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO stage_runs (id, run_id, stage, attempt, status, started_at, finished_at, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.id,
                row.run_id,
                row.stage,
                row.attempt,
                row.status,
                row.started_at,
                row.finished_at,
                row.duration_ms,
                row.error,
            ],
        )?;
        Ok(())
    }

    /// Mark in-flight runs as crashed (for crash recovery on startup).
    pub fn mark_inflight_as_crashed(&self) -> Result<usize, rusqlite::Error> {
        let count = self.conn.execute(
            "UPDATE pipeline_runs SET status = 'crashed' WHERE status = 'running'",
            [],
        )?;
        Ok(count)
    }

    /// Get recent pipeline runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pipeline, trigger_type, status, started_at, finished_at, duration_ms,
                    rows_loaded, records_rejected, error
             FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        )?;
        let rows = stmt.query_map(params![limit as i64], pipeline_run_row)?;
        rows.collect()
    }

    /// Recent runs of one pipeline, newest first.
    pub fn recent_runs_for(&self, pipeline: &str, limit: usize) -> Result<Vec<PipelineRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pipeline, trigger_type, status, started_at, finished_at, duration_ms,
                    rows_loaded, records_rejected, error
             FROM pipeline_runs WHERE pipeline = ?1
             ORDER BY started_at DESC, rowid DESC LIMIT ?2"
        )?;
        let rows = stmt.query_map(params![pipeline, limit as i64], pipeline_run_row)?;
        rows.collect()
    }

    /// Get stage runs for a specific pipeline run, in the order they were recorded.
    pub fn stage_runs_for(&self, run_id: &str) -> Result<Vec<StageRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, stage, attempt, status, started_at, finished_at, duration_ms, error
             FROM stage_runs WHERE run_id = ?1 ORDER BY rowid"
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(StageRunRow {
                id: row.get(0)?,
                run_id: row.get(1)?,
                stage: row.get(2)?,
                attempt: row.get(3)?,
                status: row.get(4)?,
                started_at: row.get(5)?,
                finished_at: row.get(6)?,
                duration_ms: row.get(7)?,
                error: row.get(8)?,
            })
        })?;
        rows.collect()
    }
}

fn pipeline_run_row(row: &rusqlite::Row<'_>) -> Result<PipelineRunRow, rusqlite::Error> {
    Ok(PipelineRunRow {
        id: row.get(0)?,
        pipeline: row.get(1)?,
        trigger_type: row.get(2)?,
        status: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        duration_ms: row.get(6)?,
        rows_loaded: row.get(7)?,
        records_rejected: row.get(8)?,
        error: row.get(9)?,
    })
}

#[derive(Debug, Clone)]
pub struct PipelineRunRow {
    pub id: String,
    pub pipeline: String,
    pub trigger_type: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub rows_loaded: Option<i64>,
    pub records_rejected: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRunRow {
    pub id: String,
    pub run_id: String,
    pub stage: String,
    pub attempt: i64,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}
