use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "listings_etl.log";
const DEFAULT_DIRECTIVES: &str = "listings_etl=info,warn";

/// Filter from `RUST_LOG`, falling back to info for the ETL and warn elsewhere.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Install stderr and daily-rolling JSON file output under [`LOG_DIR`].
///
/// The returned guard flushes the file writer on drop; hold it for the
/// lifetime of the run.
pub fn init_logging() -> WorkerGuard {
    init_logging_in(Path::new(LOG_DIR))
}

pub fn init_logging_in(dir: &Path) -> WorkerGuard {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Cannot create log directory {}: {e}", dir.display());
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));

    let stage_events = fmt::layer()
        .json()
        .with_current_span(true)
        .with_writer(file_writer);
    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // try_init so a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(stage_events)
        .with(console)
        .try_init();

    guard
}
