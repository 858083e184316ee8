use std::time::Duration;

use anyhow::{Context, Result};

use logmirror::config::{self, LoggerConfig};
use logmirror::logging;
use logmirror::{emit, inspect, LogLevel, LogOptions, Logger};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_directories()?;

    // System log first, so setup below is traced
    let (log_file_info, _guard) = logging::init_system_log(config::logs_dir())?;

    if let Ok(count) = logging::cleanup_old_logs(&config::logs_dir()) {
        if count > 0 {
            tracing::info!("Cleaned up {} old log files", count);
        }
    }

    tracing::info!("Logging to: {}", log_file_info.path.display());

    let config = LoggerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default config");
        LoggerConfig::default()
    });

    let logger = Logger::builder(config)
        .mirror_standard_streams()
        .build()
        .context("Failed to start logger")?;
    logmirror::install_global(logger.clone());

    // Observers only trace; printing here would feed back into the mirror
    let mut snapshots = logger.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            tracing::trace!(
                revision = snapshot.revision,
                records = snapshot.records.len(),
                "Snapshot published"
            );
        }
    });

    emit!(logger, "Logmirror demo started");
    emit!(logger, level = LogLevel::Working; "warming cache for", 3, "regions");
    emit!(logger, level = LogLevel::Success; "cache ready");
    emit!(logger, level = LogLevel::Warn; "slow region:", "eu-west");
    emit!(
        logger,
        opts = LogOptions::new().level(LogLevel::Error).separator(" | ");
        "upload failed",
        "retrying"
    );
    let retries: Option<u32> = Some(2);
    inspect!(logger, "retries", retries);

    println!("plain stdout line from the demo");
    eprintln!("plain stderr line from the demo");

    // Give the drain thread a moment to pick up the direct writes
    tokio::time::sleep(Duration::from_millis(100)).await;

    let dumper = logger.clone();
    let path = tokio::task::spawn_blocking(move || dumper.dump_to_file())
        .await
        .context("Dump task panicked")?
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let stats = logger.snapshot().statistics();
    tracing::info!(total = stats.total, "Demo finished");
    println!("Dump written to {}", path.display());

    Ok(())
}
