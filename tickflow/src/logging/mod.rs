//! Logging setup: console plus daily-rolling file output with local-time
//! timestamps.

use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::Result;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "tickflow=info,lapin=warn";

/// Custom timer that uses the local timezone via chrono, making logs easier
/// to correlate with local time.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Initialize logging with a console layer and a daily-rolling file layer.
///
/// The returned guard must stay alive for the duration of the process, or
/// buffered file output is lost.
pub fn init_logging(log_dir: impl AsRef<Path>) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_appender = tracing_appender::rolling::daily(log_dir, "tickflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer().with_timer(LocalTimer).with_target(true);
    let file_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_writer(file_writer)
        .with_ansi(false)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
