//! The batch status poller.
//!
//! One `run()` per scheduler invocation; no long-lived process. Each run is
//! a stateless scan that is safe to overlap with a previous, still-running
//! invocation: every persisted change is a single-record compare-and-swap,
//! and losing a race just means another invocation already did the work.
//!
//! Pass order matters. The retry-trigger sweep over `completed` records runs
//! BEFORE the API poll pass, so a record left `completed` by an earlier
//! crash (or a trigger that lost its race) is healed first; the poll pass
//! only ever queries `in_progress` records, so nothing is polled twice.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::trigger::{Trigger, TriggerOutcome};
use crate::batch_api::{BatchApi, BatchPollStatus};
use crate::error::{BatchwatchError, Result};
use crate::models::BatchFailure;
use crate::state_machine::BatchEvent;
use crate::storage::StatusStore;

/// Per-invocation outcome summary, logged and returned to the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerReport {
    /// Records present in the document at load time
    pub records_seen: usize,
    /// Records queried against the batch API
    pub polled: usize,
    /// Records this invocation moved to `completed`
    pub completed: usize,
    /// Records this invocation moved to `failed`
    pub failed: usize,
    /// Pipelines this invocation started
    pub triggered: usize,
    /// Trigger attempts that lost to a concurrent invocation
    pub trigger_conflicts: usize,
    /// State writes that succeeded but whose pipeline start failed
    pub trigger_start_failures: usize,
    /// Records skipped this run because the batch API call failed
    pub api_errors: usize,
}

impl CheckerReport {
    /// Whether anything needs operator attention.
    pub fn is_clean(&self) -> bool {
        self.trigger_start_failures == 0
    }
}

/// The poller: queries the batch API for in-flight records and hands
/// completed ones to the trigger.
pub struct Checker {
    store: Arc<StatusStore>,
    api: Arc<dyn BatchApi>,
    trigger: Trigger,
}

impl Checker {
    pub fn new(store: Arc<StatusStore>, api: Arc<dyn BatchApi>, trigger: Trigger) -> Self {
        Self {
            store,
            api,
            trigger,
        }
    }

    /// Run one full checker pass.
    ///
    /// Fatal errors (corrupt document) abort the invocation and propagate;
    /// per-record failures are logged, counted, and skipped so one bad
    /// record never starves the rest.
    pub async fn run(&self) -> Result<CheckerReport> {
        let invocation_id = Uuid::new_v4();
        let mut report = CheckerReport::default();

        // CorruptState propagates here and aborts the invocation; an absent
        // blob is just an empty store.
        let (document, _) = self.store.load_or_empty().await?;
        report.records_seen = document.len();

        if document.is_empty() {
            info!(%invocation_id, "no batches to watch");
            return Ok(report);
        }

        info!(
            %invocation_id,
            records = document.len(),
            "checker invocation started"
        );

        // Pass 1: sweep records a previous invocation completed but never
        // managed to trigger.
        for project_key in document.triggerable_keys() {
            self.run_trigger(&project_key, &mut report).await?;
        }

        // Pass 2: poll the batch API for in-flight records.
        for project_key in document.pollable_keys() {
            // The document snapshot is only used for iteration order; the
            // batch id is stable for the life of the record.
            let Some(record) = document.get(&project_key) else {
                continue;
            };
            self.poll_record(&project_key, &record.batch_id, &mut report)
                .await?;
        }

        info!(
            %invocation_id,
            records = report.records_seen,
            polled = report.polled,
            completed = report.completed,
            failed = report.failed,
            triggered = report.triggered,
            trigger_conflicts = report.trigger_conflicts,
            trigger_start_failures = report.trigger_start_failures,
            api_errors = report.api_errors,
            "checker invocation finished"
        );
        Ok(report)
    }

    async fn poll_record(
        &self,
        project_key: &str,
        batch_id: &str,
        report: &mut CheckerReport,
    ) -> Result<()> {
        let poll = match self.api.poll(batch_id).await {
            Ok(poll) => poll,
            Err(e) => {
                // Non-fatal for the invocation: the record keeps its state
                // and the next scheduled run retries.
                warn!(project_key, batch_id, error = %e, "batch API poll failed, skipping record");
                report.api_errors += 1;
                return Ok(());
            }
        };
        report.polled += 1;
        let now = Utc::now();

        match poll.status {
            BatchPollStatus::Pending => {
                if let Some(counts) = poll.request_counts {
                    info!(
                        project_key,
                        batch_id,
                        completed = counts.completed,
                        failed = counts.failed,
                        total = counts.total,
                        "batch still in progress"
                    );
                }
                match self
                    .store
                    .try_touch_progress(project_key, poll.request_counts, now)
                    .await
                {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(project_key, error = %e, "progress touch failed, dropping");
                    }
                }
            }
            BatchPollStatus::Completed => {
                let counts = poll.request_counts;
                let wrote = self
                    .apply_poll_event(project_key, |record| {
                        record.touch_progress(counts, now);
                        record.apply(&BatchEvent::MarkCompleted, now)
                    })
                    .await?;
                if wrote {
                    info!(project_key, batch_id, "batch completed");
                    report.completed += 1;
                    // Hand off immediately; a failure here leaves the record
                    // `completed` for the next invocation's sweep.
                    self.run_trigger(project_key, report).await?;
                }
            }
            BatchPollStatus::Failed { reason } => {
                let counts = poll.request_counts;
                let failure =
                    BatchFailure::new(reason.clone(), format!("batch API reported {reason}"));
                let wrote = self
                    .apply_poll_event(project_key, |record| {
                        record.touch_progress(counts, now);
                        record.apply(&BatchEvent::MarkFailed(failure.clone()), now)
                    })
                    .await?;
                if wrote {
                    warn!(project_key, batch_id, reason = %reason, "batch failed");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Apply a poll-derived event through the single-record CAS loop.
    /// Returns whether this invocation performed the write; a rival that got
    /// there first shows up as an invalid transition and is not an error.
    async fn apply_poll_event<F>(&self, project_key: &str, mutate: F) -> Result<bool>
    where
        F: FnMut(&mut crate::models::BatchRecord) -> Result<crate::state_machine::BatchState>,
    {
        match self.store.mutate_record(project_key, mutate).await {
            Ok(_) => Ok(true),
            Err(BatchwatchError::InvalidTransition { from, .. }) => {
                info!(
                    project_key,
                    current_state = %from,
                    "record already advanced by a concurrent invocation"
                );
                Ok(false)
            }
            Err(BatchwatchError::NotFound { .. }) => {
                // Removed by explicit cleanup between our load and the write.
                warn!(project_key, "record disappeared during invocation");
                Ok(false)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!(project_key, error = %e, "state write failed, leaving record for next run");
                Ok(false)
            }
        }
    }

    async fn run_trigger(&self, project_key: &str, report: &mut CheckerReport) -> Result<()> {
        match self.trigger.trigger(project_key).await {
            Ok(TriggerOutcome::Triggered) => {
                report.triggered += 1;
                Ok(())
            }
            Ok(TriggerOutcome::AlreadyTriggered) => {
                report.trigger_conflicts += 1;
                Ok(())
            }
            Ok(TriggerOutcome::StartFailed { message }) => {
                error!(project_key, %message, "pipeline start failed; stale-trigger monitor will surface this record");
                report.trigger_start_failures += 1;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!(project_key, error = %e, "trigger attempt failed, record stays completed");
                Ok(())
            }
        }
    }
}
