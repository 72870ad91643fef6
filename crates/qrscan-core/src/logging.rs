//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Initialize the logging subsystem
///
/// Logs are written to `~/.local/share/qrscan/logs/` so stdout stays free for
/// the headless NDJSON stream. Log level is controlled by the `QRSCAN_LOG`
/// environment variable.
///
/// # Examples
/// ```bash
/// QRSCAN_LOG=debug qrscan bridge --feed code.png
/// QRSCAN_LOG=qrscan_device=trace qrscan bridge --feed code.png
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "qrscan.log");

    // Default to info for our crates, allow override via QRSCAN_LOG
    let env_filter = EnvFilter::try_from_env("QRSCAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new("qrscan=info,qrscan_core=info,qrscan_device=info,qrscan_app=info,warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("qrscan starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Get the log directory path
fn get_log_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("qrscan").join("logs")
}
