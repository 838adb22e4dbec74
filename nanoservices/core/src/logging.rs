/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` from the environment (default level is `info`) and
/// attempts to install a global fmt subscriber. Safe to call more than once:
/// later calls are ignored.
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] but with a caller-chosen default filter, used by the CLI
/// for `--verbose`.
pub fn init_with_default(default_filter: &str) {
    let env = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env))
        .with_target(false)
        .try_init();
}
