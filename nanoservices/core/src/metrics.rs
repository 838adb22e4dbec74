use prometheus::{Encoder, TextEncoder, Registry, HistogramVec, CounterVec, IntCounterVec, Opts};
use once_cell::sync::Lazy;
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::convert::Infallible;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, Method, StatusCode};
use hyper::service::service_fn;

// Global registry and metrics are initialized lazily.
static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::new_custom(Some("sekolah_core".to_string()), None).unwrap());

static PIPELINE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = Opts::new("pipeline_duration_ms", "Pipeline run duration in milliseconds");
    let hist = HistogramVec::new(prometheus::HistogramOpts::from(opts), &["pipeline_name"]).unwrap();
    REGISTRY.register(Box::new(hist.clone())).ok();
    hist
});

static PIPELINE_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("pipeline_runs_total", "Total finished pipeline runs");
    let c = CounterVec::new(opts, &["pipeline_name", "status"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static PIPELINE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("pipeline_failures_total", "Total failed pipeline runs");
    let c = CounterVec::new(opts, &["pipeline_name", "stage"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static STAGE_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("stage_retries_total", "Stage attempts that failed and were retried");
    let c = IntCounterVec::new(opts, &["pipeline_name", "stage"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ROWS_LOADED: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("rows_loaded_total", "Rows written to the destination table");
    let c = IntCounterVec::new(opts, &["pipeline_name"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECORDS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("records_rejected_total", "Records dropped for missing coordinates");
    let c = IntCounterVec::new(opts, &["pipeline_name"]).unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Observe a pipeline run duration in milliseconds.
pub fn observe_duration(pipeline_name: &str, duration_ms: f64) {
    PIPELINE_DURATION_MS.with_label_values(&[pipeline_name]).observe(duration_ms);
}

/// Count a finished run under its final status.
pub fn inc_run(pipeline_name: &str, status: &str) {
    PIPELINE_RUNS.with_label_values(&[pipeline_name, status]).inc();
}

/// Increment the failure counter for a pipeline, labelled with the stage that failed.
pub fn inc_failure(pipeline_name: &str, stage: &str) {
    PIPELINE_FAILURES.with_label_values(&[pipeline_name, stage]).inc();
}

pub fn inc_retry(pipeline_name: &str, stage: &str) {
    STAGE_RETRIES.with_label_values(&[pipeline_name, stage]).inc();
}

pub fn add_rows_loaded(pipeline_name: &str, rows: usize) {
    ROWS_LOADED.with_label_values(&[pipeline_name]).inc_by(rows as u64);
}

pub fn add_rejected(pipeline_name: &str, records: usize) {
    RECORDS_REJECTED.with_label_values(&[pipeline_name]).inc_by(records as u64);
}

/// Gather metrics as text in Prometheus exposition format.
///
/// ```no_run
/// use sekolah_core::metrics;
/// metrics::inc_run("sekolah_etl", "completed");
/// let body = metrics::gather_text();
/// println!("metrics:\n{}", body);
/// ```
pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

async fn serve_metrics(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut ok = Response::new(Body::from(gather_text()));
            ok.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            ok
        }
        _ => {
            let mut missing = Response::new(Body::empty());
            *missing.status_mut() = StatusCode::NOT_FOUND;
            missing
        }
    };
    Ok(response)
}

/// Start an HTTP exporter that serves `/metrics` until `shutdown` resolves.
///
/// The server runs on its own thread with a single-threaded Tokio runtime, so
/// it can be started from synchronous code as well as from inside a runtime.
///
/// ```no_run
/// use std::net::TcpListener;
/// use sekolah_core::metrics;
///
/// let listener = TcpListener::bind("127.0.0.1:9184").unwrap();
/// let shutdown = async { let _ = tokio::signal::ctrl_c().await; };
/// let _handle = metrics::start_exporter_with_shutdown(listener, shutdown);
/// ```
pub fn start_exporter_with_shutdown<F>(listener: TcpListener, shutdown: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "failed to create runtime for metrics exporter");
                return;
            }
        };

        rt.block_on(async move {
            if let Err(e) = listener.set_nonblocking(true) {
                tracing::error!(error = ?e, "failed to set listener to non-blocking");
                return;
            }
            let tcp_listener = match tokio::net::TcpListener::from_std(listener) {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = ?e, "failed to convert metrics listener");
                    return;
                }
            };
            if let Ok(addr) = tcp_listener.local_addr() {
                tracing::info!(%addr, "metrics exporter listening");
            }

            let mut shutdown_fut = Box::pin(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown_fut => {
                        tracing::info!("metrics exporter shutdown requested");
                        break;
                    }
                    accept = tcp_listener.accept() => {
                        match accept {
                            Ok((stream, _peer)) => {
                                tokio::spawn(async move {
                                    if let Err(err) = hyper::server::conn::Http::new()
                                        .serve_connection(stream, service_fn(serve_metrics))
                                        .await
                                    {
                                        tracing::error!(error = ?err, "connection serve error");
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!(error = ?e, "failed to accept connection on metrics listener");
                                break;
                            }
                        }
                    }
                }
            }

            tracing::info!("metrics exporter stopped");
        });
    })
}

/// Start the exporter and return a oneshot sender that stops it.
pub fn start_exporter(listener: TcpListener) -> (JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = start_exporter_with_shutdown(listener, async move { let _ = rx.await; });
    (handle, tx)
}
