use std::path::Path;
use std::time::Duration;

use sekolah_core::config::loader::parse_config;
use sekolah_core::config::types::FlowConfig;
use sekolah_core::destinations::sqlite::SqliteSink;
use sekolah_core::destinations::traits::TableRef;
use sekolah_core::engine::SekolahFlow;
use sekolah_core::scheduler::state::RunStatus;
use sekolah_core::store::db::Store;
use sekolah_core::transforms::traits::RejectReason;

const SCENARIO: &str = r#"{
  "dataSekolah": [
    {"npsn": "1", "status": "N", "bentuk": "SMA", "sekolah": "SMA 1", "alamat_jalan": "Jl. Merdeka", "lintang": "-6.2", "bujur": "106.8"},
    {"npsn": "2", "status": "S", "bentuk": "SMA", "sekolah": "SMA 2", "alamat_jalan": "Jl. Sudirman", "lintang": "-6.3", "bujur": "106.9"},
    {"npsn": "3", "status": "N", "bentuk": "SMA", "sekolah": "SMA 3", "alamat_jalan": "Jl. Thamrin", "lintang": "abc", "bujur": "106.7"}
  ]
}"#;

fn config(dir: &Path, trigger: &str, retries: u32) -> FlowConfig {
    let yaml = format!(
        r#"
pipeline: sekolah_etl
trigger: {trigger}
retries: {retries}
retry_delay: 1s
source:
  path: "{source}"
destination:
  path: "{dest}"
history:
  path: "{history}"
"#,
        source = dir.join("data_sekolah.json").display(),
        dest = dir.join("warehouse.db").display(),
        history = dir.join("history.db").display(),
    );
    parse_config(&yaml).expect("valid config")
}

fn text(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}

#[tokio::test]
async fn run_once_loads_public_high_schools() {
    sekolah_core::logging::init();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data_sekolah.json"), SCENARIO).unwrap();
    let config = config(dir.path(), "{ type: daily }", 0);

    let finished = SekolahFlow::from_config(&config).unwrap().run_once().await.unwrap();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status, RunStatus::Completed);

    let report = finished[0].outcome.as_ref().unwrap();
    assert_eq!(report.records_extracted, 3);
    assert_eq!(report.rows_loaded, 1);
    assert_eq!(report.table, "hijir.target_table");
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].npsn.as_deref(), Some("3"));
    assert_eq!(report.rejected[0].reason, RejectReason::MissingLatitude);

    let sink = SqliteSink::open(dir.path().join("warehouse.db"));
    let contents = sink.read_rows(&TableRef::default()).await.unwrap();
    assert_eq!(
        contents.columns,
        vec!["npsn", "status", "bentuk", "sekolah", "alamat_jalan", "lintang", "bujur", "school_address"]
    );
    assert_eq!(
        contents.rows,
        vec![text(&["1", "N", "SMA", "SMA 1", "Jl. Merdeka", "-6.2", "106.8", "SMA 1 - Jl. Merdeka"])]
    );
    assert!(dir.path().join("hijir.db").exists());

    let store = Store::open(dir.path().join("history.db")).unwrap();
    let runs = store.recent_runs_for("sekolah_etl", 10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "completed");
    assert_eq!(runs[0].rows_loaded, Some(1));
    assert_eq!(runs[0].records_rejected, Some(1));
}

#[tokio::test]
async fn second_run_replaces_first() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("data_sekolah.json");
    let config = config(dir.path(), "{ type: daily }", 0);

    std::fs::write(&source, SCENARIO).unwrap();
    SekolahFlow::from_config(&config).unwrap().run_once().await.unwrap();

    std::fs::write(
        &source,
        r#"{"dataSekolah": [
            {"status": "N", "bentuk": "SMA", "sekolah": "SMA 9", "alamat_jalan": "Jl. Baru", "lintang": 1.5, "bujur": 2}
        ]}"#,
    )
    .unwrap();
    SekolahFlow::from_config(&config).unwrap().run_once().await.unwrap();

    let contents = SqliteSink::open(dir.path().join("warehouse.db"))
        .read_rows(&TableRef::default())
        .await
        .unwrap();
    assert_eq!(
        contents.columns,
        vec!["status", "bentuk", "sekolah", "alamat_jalan", "lintang", "bujur", "school_address"]
    );
    assert_eq!(
        contents.rows,
        vec![text(&["N", "SMA", "SMA 9", "Jl. Baru", "1.5", "2", "SMA 9 - Jl. Baru"])]
    );
}

#[tokio::test]
async fn missing_source_fails_run_and_leaves_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "{ type: daily }", 0);

    std::fs::write(dir.path().join("data_sekolah.json"), SCENARIO).unwrap();
    SekolahFlow::from_config(&config).unwrap().run_once().await.unwrap();
    std::fs::remove_file(dir.path().join("data_sekolah.json")).unwrap();

    let finished = SekolahFlow::from_config(&config).unwrap().run_once().await.unwrap();
    assert_eq!(finished[0].status, RunStatus::Failed);
    let err = finished[0].outcome.as_ref().unwrap_err();
    assert!(err.to_string().contains("extract"), "unexpected error: {err}");

    let contents = SqliteSink::open(dir.path().join("warehouse.db"))
        .read_rows(&TableRef::default())
        .await
        .unwrap();
    assert_eq!(contents.rows.len(), 1);

    let store = Store::open(dir.path().join("history.db")).unwrap();
    let runs = store.recent_runs(1).unwrap();
    assert_eq!(runs[0].status, "failed");
    let stages: Vec<String> = store
        .stage_runs_for(&runs[0].id)
        .unwrap()
        .into_iter()
        .map(|s| format!("{}:{}", s.stage, s.status))
        .collect();
    assert_eq!(stages, vec!["extract:failed", "transform:skipped", "load:skipped"]);
}

#[tokio::test]
async fn scheduled_engine_runs_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data_sekolah.json"), SCENARIO).unwrap();
    let config = config(dir.path(), "{ type: interval, every: 1s }", 0);

    SekolahFlow::from_config(&config)
        .unwrap()
        .run_with_shutdown(tokio::time::sleep(Duration::from_millis(3300)))
        .await
        .unwrap();

    let store = Store::open(dir.path().join("history.db")).unwrap();
    let runs = store.recent_runs(10).unwrap();
    assert!(runs.len() >= 2, "expected at least two scheduled runs, got {}", runs.len());
    assert!(runs.iter().all(|r| r.status == "completed" && r.trigger_type == "interval"));
}
