//! Logging initialization
//!
//! Console output with an env-filter (overridable via `RUST_LOG`) and an
//! optional rolling file appender. Noisy dependency targets are pinned to
//! `warn` unless the configured level is `trace`.

use std::path::PathBuf;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Initialize the logging system from configuration.
///
/// Safe to call once per process; later calls return an error from the
/// subscriber registry, which callers may ignore in tests.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);

    let console_layer = config
        .console_output
        .then(|| tracing_subscriber::fmt::layer().with_target(true));

    let file_layer = if config.file_output {
        let directory = config
            .log_directory
            .clone()
            .unwrap_or_else(default_log_directory);
        std::fs::create_dir_all(&directory)?;
        let appender = tracing_appender::rolling::daily(directory, "wholesale-sync.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn build_filter(level: &str) -> EnvFilter {
    let directives = if level == "trace" {
        level.to_string()
    } else {
        // Keep dependency internals quiet below trace.
        format!("{level},sqlx=warn,hyper=warn,reqwest=warn,html5ever=warn")
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

fn default_log_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}
