use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "medplan_aggregator=info";

/// Initializes the logging system with both console and file output.
///
/// Console output goes to stderr so that `--json` output on stdout stays clean.
pub fn init_logging(dir: &Path) {
    // Ensure logs directory exists
    let _ = fs::create_dir_all(dir);

    // Create a non-blocking file appender for daily log rotation
    let file_appender = tracing_appender::rolling::daily(dir, "aggregator.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Create a JSON layer for file logging
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Create a formatted layer for console logging
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    // try_init so a second call (e.g. from tests) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // We need to keep the guard alive so logs are flushed on exit
    std::mem::forget(guard);
}
