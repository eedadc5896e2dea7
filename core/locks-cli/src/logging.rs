//! Logging setup for the CLI.
//!
//! Human-readable events go to stderr. When the log directory can be created, a
//! daily-rolling file under `<data_dir>/lfs-locks/logs` receives the same
//! events with UTC timestamps. The returned guard flushes that file on drop and
//! must live as long as the process.

use std::env;

use lfs_locks_core::config::get_log_dir;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILTER_ENV: &str = "LFS_LOCKS_LOG";
const DEBUG_LOG_ENV: &str = "LFS_LOCKS_DEBUG_LOG";

pub fn init() -> Option<WorkerGuard> {
    let (file_layer, guard) = match file_writer() {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let dir = get_log_dir()?;
    fs_err::create_dir_all(&dir).ok()?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("lfs-locks")
        .filename_suffix("log")
        .build(&dir)
        .ok()?;
    Some(tracing_appender::non_blocking(appender))
}
