//! Tracing setup. Filter comes from `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. Returns `false` when one is already set.
pub fn init() -> bool {
    let subscriber = FmtSubscriber::builder()
        .compact()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

pub fn init_test(level: &str) {
    let subscriber = FmtSubscriber::builder()
        .without_time()
        .compact()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(level))
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
