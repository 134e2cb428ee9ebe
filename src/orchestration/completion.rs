//! Terminal-state reporting for the downstream pipeline.
//!
//! The pipeline, once triggered, is the only component allowed to land a
//! record in `done` or `failed`-after-trigger; it does so through this
//! reporter, which routes the write through the same single-record CAS loop
//! as every other transition. Reporting against a record that is not
//! `triggered` is an invalid transition and is returned as such.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::models::BatchFailure;
use crate::state_machine::BatchEvent;
use crate::storage::StatusStore;

/// Writes the pipeline's terminal outcome back into the status store.
pub struct CompletionReporter {
    store: Arc<StatusStore>,
}

impl CompletionReporter {
    pub fn new(store: Arc<StatusStore>) -> Self {
        Self { store }
    }

    /// Record pipeline success: `triggered -> done`.
    pub async fn report_done(&self, project_key: &str) -> Result<()> {
        let now = Utc::now();
        self.store
            .mutate_record(project_key, |record| {
                record.apply(&BatchEvent::ReportDone, now)
            })
            .await?;
        info!(project_key, "pipeline reported done");
        Ok(())
    }

    /// Record pipeline failure: `triggered -> failed`, with detail.
    pub async fn report_failed(&self, project_key: &str, failure: BatchFailure) -> Result<()> {
        let now = Utc::now();
        self.store
            .mutate_record(project_key, |record| {
                record.apply(&BatchEvent::ReportFailed(failure.clone()), now)
            })
            .await?;
        info!(project_key, "pipeline reported failure");
        Ok(())
    }
}
