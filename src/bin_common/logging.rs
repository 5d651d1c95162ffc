//! Logging setup shared by binaries

use tracing_subscriber::EnvFilter;

/// Load `.env`, then install a fmt subscriber filtered by `RUST_LOG`
///
/// `default_filter` applies when `RUST_LOG` is unset or invalid.
pub fn init_tracing(default_filter: &str) {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
