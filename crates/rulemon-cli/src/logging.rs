//! Tracing subscriber setup

use crate::config::Verbosity;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the verbosity flags. Calling twice is harmless.
pub fn init_logging(verbosity: Verbosity, color: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .try_init();
}
