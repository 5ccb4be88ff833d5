use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber once per test binary; `RUST_LOG` controls
/// what the data layer logs during a run.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
