//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to console and,
//! optionally, a JSON file per invocation for post-hoc correlation of
//! overlapping checker runs.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::system;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// `log_dir: None` logs to console only.
pub fn init_structured_logging(log_dir: Option<PathBuf>) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let log_level = default_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.clone())));

        let registry = tracing_subscriber::registry().with(console_layer);

        if let Some(log_dir) = log_dir {
            if !log_dir.exists() {
                if let Err(e) = fs::create_dir_all(&log_dir) {
                    eprintln!("failed to create log directory {}: {e}", log_dir.display());
                }
            }
            let filename = format!("{}.{}.log", environment, process::id());
            let file_appender = tracing_appender::rolling::never(&log_dir, filename);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(EnvFilter::new(log_level));

            if registry.with(file_layer).try_init().is_ok() {
                // Keep the non-blocking writer alive for the process lifetime
                std::mem::forget(guard);
            }
        } else if registry.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            "structured logging initialized"
        );
    });
}

/// Current environment from `BATCHWATCH_ENV`, defaulting to development.
pub fn detect_environment() -> String {
    std::env::var(system::ENV_VAR).unwrap_or_else(|_| "development".to_string())
}

/// Default log level per environment when `RUST_LOG` is unset.
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
