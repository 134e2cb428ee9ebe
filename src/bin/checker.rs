//! Scheduler-invoked checker binary.
//!
//! Intended to run on a fixed interval (cron, Cloud Scheduler, systemd
//! timer) with at-least-once delivery. Each run is one checker pass plus a
//! stale-trigger scan, then exit: status state lives entirely in the store,
//! so overlapping or repeated invocations are safe.
//!
//! Exit codes: 0 on success (including "nothing to do"), 1 on fatal errors
//! such as a corrupt status document or invalid configuration.

use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use batchwatch_core::adapters::{CommandBatchApi, CommandPipelineStarter};
use batchwatch_core::config::ConfigManager;
use batchwatch_core::logging::init_structured_logging;
use batchwatch_core::orchestration::{Checker, StaleTriggerMonitor, Trigger};
use batchwatch_core::storage::StatusStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "checker invocation failed");
        eprintln!("checker invocation failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_dir = std::env::args().nth(1).map(PathBuf::from);
    let manager = ConfigManager::load(config_dir).context("loading configuration")?;
    let config = manager.config().clone();

    init_structured_logging(config.logging.dir.clone());
    info!(environment = manager.environment(), "checker starting");

    let backend = config.storage.create_backend();
    let store = Arc::new(
        StatusStore::new(backend, config.storage.status_blob.clone())
            .with_retry_policy(config.backoff.clone()),
    );
    info!(status_blob = store.path(), "status store ready");

    let api = Arc::new(
        CommandBatchApi::new(
            config.collaborators.batch_poll_command.clone(),
            Duration::from_secs(config.collaborators.api_timeout_seconds),
        )
        .context("building batch API adapter")?,
    );
    let starter = Arc::new(
        CommandPipelineStarter::new(config.collaborators.pipeline_start_command.clone())
            .context("building pipeline starter adapter")?,
    );

    let trigger = Trigger::new(store.clone(), starter);
    let checker = Checker::new(store.clone(), api, trigger);

    let report = checker.run().await.context("checker pass")?;

    // Surface triggered-but-silent records; state is never mutated here.
    let threshold = chrono::Duration::seconds(
        config.monitor.stale_trigger_threshold_seconds as i64,
    );
    let monitor = StaleTriggerMonitor::new(threshold);
    let (document, _) = store.load_or_empty().await.context("stale-trigger scan")?;
    for stale in monitor.scan(&document, Utc::now()) {
        warn!(
            project_key = %stale.project_key,
            batch_id = %stale.batch_id,
            age_seconds = stale.age_seconds,
            "record triggered with no terminal callback; needs operator attention"
        );
    }

    if !report.is_clean() {
        warn!(
            start_failures = report.trigger_start_failures,
            "invocation finished with pipeline start failures"
        );
    }
    Ok(())
}
