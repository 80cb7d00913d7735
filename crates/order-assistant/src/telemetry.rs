//! Logging setup for the binary. The library itself only emits `tracing` events.

use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset. HTTP client internals stay quiet.
pub const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Logs go to stderr so the chat REPL owns stdout.
pub fn init_tracing_with(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    // A second call (tests, embedding applications) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
