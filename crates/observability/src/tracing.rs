//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Without `RUST_LOG` the
//! application logs at `info` and the HTTP, database and hyper stacks only
//! report warnings.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,tower_http=warn,sqlx=warn,hyper=warn";

/// `RUST_LOG` when it parses, the default directives otherwise.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .with_target(true)
        .try_init();
}
