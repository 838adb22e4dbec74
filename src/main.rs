use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sekolah_flow::core::metrics;
use sekolah_flow::core::scheduler::state::RunStatus;
use sekolah_flow::core::store::db::Store;
use sekolah_flow::{load_config, FlowConfig, SekolahFlow};

#[derive(Parser)]
#[command(name = "sekolah_flow")]
#[command(about = "Loads public high school records into hijir.target_table")]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once, now
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the pipeline on its configured schedule until Ctrl-C
    Serve {
        #[arg(long)]
        config: PathBuf,
        /// Serve Prometheus metrics at http://<addr>/metrics
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Show recent runs from the history database
    History {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Also list every stage attempt
        #[arg(long)]
        stages: bool,
    },
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<FlowConfig> {
    let config = load_config(path).with_context(|| format!("loading {}", path.display()))?;
    ensure_parent(&config.destination.path)?;
    Ok(config)
}

async fn run_now(config: &FlowConfig) -> anyhow::Result<()> {
    let finished = SekolahFlow::from_config(config)?.run_once().await?;

    let mut failed = 0;
    for run in &finished {
        match &run.outcome {
            Ok(report) => {
                println!(
                    "{}: {} ({} extracted, {} rows loaded into {}, {} rejected)",
                    run.pipeline,
                    run.status.as_str(),
                    report.records_extracted,
                    report.rows_loaded,
                    report.table,
                    report.rejected.len()
                );
                for rejected in &report.rejected {
                    println!(
                        "  rejected #{} npsn={} reason={}",
                        rejected.position,
                        rejected.npsn.as_deref().unwrap_or("-"),
                        rejected.reason.as_str()
                    );
                }
            }
            Err(e) => {
                println!("{}: {} ({e})", run.pipeline, run.status.as_str());
                if run.status == RunStatus::Failed {
                    failed += 1;
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} run(s) failed");
    }
    Ok(())
}

async fn serve(config: &FlowConfig, metrics_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let exporter = match metrics_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr).with_context(|| format!("binding metrics on {addr}"))?;
            info!(%addr, "serving metrics");
            Some(metrics::start_exporter(listener))
        }
        None => None,
    };

    SekolahFlow::from_config(config)?.run().await?;

    if let Some((handle, stop)) = exporter {
        let _ = stop.send(());
        if handle.join().is_err() {
            warn!("metrics exporter thread panicked");
        }
    }
    Ok(())
}

fn history(config: &FlowConfig, limit: usize, stages: bool) -> anyhow::Result<()> {
    let Some(path) = &config.history.path else {
        bail!("config has no history.path; runs are only kept in memory");
    };
    let store = Store::open(path).with_context(|| format!("opening {}", path.display()))?;

    let runs = store.recent_runs_for(&config.pipeline, limit)?;
    if runs.is_empty() {
        println!("no runs recorded for {}", config.pipeline);
        return Ok(());
    }
    for run in runs {
        println!(
            "{} {} {:<9} trigger={} rows={} rejected={} duration_ms={}{}",
            run.started_at,
            run.id,
            run.status,
            run.trigger_type,
            run.rows_loaded.map_or("-".to_string(), |v| v.to_string()),
            run.records_rejected.map_or("-".to_string(), |v| v.to_string()),
            run.duration_ms.map_or("-".to_string(), |v| v.to_string()),
            run.error.map(|e| format!(" error={e}")).unwrap_or_default()
        );
        if stages {
            for stage in store.stage_runs_for(&run.id)? {
                println!(
                    "    {:<9} attempt={} {}{}",
                    stage.stage,
                    stage.attempt,
                    stage.status,
                    stage.error.map(|e| format!(" error={e}")).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    sekolah_flow::core::logging::init_with_default(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Run { config } => run_now(&load(&config)?).await,
        Commands::Serve { config, metrics_addr } => serve(&load(&config)?, metrics_addr).await,
        Commands::History { config, limit, stages } => {
            history(&load_config(&config).with_context(|| format!("loading {}", config.display()))?, limit, stages)
        }
    }
}
