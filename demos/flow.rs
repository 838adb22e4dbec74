use std::sync::Arc;
use std::time::Duration;

use sekolah_flow::core::destinations::{SqliteSink, TableLoader, TableRef};
use sekolah_flow::core::metrics;
use sekolah_flow::core::pipeline::retry::RetryPolicy;
use sekolah_flow::core::sources::json_file::JsonFileSource;
use sekolah_flow::core::transforms::SchoolTransform;
use sekolah_flow::{PipelineBuilder, SekolahFlow, Trigger};

/// Wires the school pipeline by hand instead of from YAML and runs it every
/// minute until Ctrl-C, with metrics on an OS-assigned port.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sekolah_flow::core::logging::init();

    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    println!("metrics at http://{addr}/metrics");
    let (exporter, stop_exporter) = metrics::start_exporter(listener);

    std::fs::create_dir_all("warehouse")?;
    let (trigger, def) = PipelineBuilder::new("sekolah_demo")
        .trigger(Trigger::Interval(Duration::from_secs(60)))
        .source(JsonFileSource::new("demos/data_sekolah.json"))
        .transform(SchoolTransform::new())
        .destination(TableLoader::new(
            Arc::new(SqliteSink::open("warehouse/warehouse.db")),
            TableRef::default(),
        ))
        .retry(RetryPolicy::new(1, Duration::from_secs(10)))
        .build()?;

    SekolahFlow::new()
        .history_path("warehouse/history.db")
        .add_pipeline(trigger, def)
        .run()
        .await?;

    let _ = stop_exporter.send(());
    let _ = exporter.join();
    Ok(())
}
