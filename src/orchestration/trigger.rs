//! Exactly-once pipeline triggering.
//!
//! The ordering here is the idempotency anchor for the whole system:
//! the `completed -> triggered` state write is persisted FIRST, and only the
//! writer that wins that compare-and-swap invokes the downstream start
//! action. At most one winner can exist per record, so at most one pipeline
//! start is attempted no matter how many checker invocations race.
//!
//! The inverse ordering (start, then persist) would double-start the
//! pipeline whenever an invocation crashed between the two steps.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{BatchwatchError, Result};
use crate::state_machine::BatchEvent;
use crate::storage::StatusStore;

/// Parameters handed to the downstream pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub project_key: String,
    pub output_dir: String,
    pub model_name: String,
}

/// Collaborator that launches the downstream multi-stage pipeline.
///
/// Fire-and-forget from the trigger's perspective: the pipeline reports its
/// terminal outcome later through the completion callback, never through
/// this call's return value.
#[async_trait]
pub trait PipelineStarter: Send + Sync {
    async fn start(&self, request: StartRequest) -> Result<()>;
}

/// What a trigger attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// This invocation won the state write and started the pipeline.
    Triggered,
    /// Another invocation already moved the record past `completed`; no
    /// pipeline start was attempted here.
    AlreadyTriggered,
    /// The state write won but the start action failed. The record stays
    /// `triggered`; the stale-trigger monitor surfaces it.
    StartFailed { message: String },
}

/// Idempotent starter for the downstream pipeline.
pub struct Trigger {
    store: Arc<StatusStore>,
    starter: Arc<dyn PipelineStarter>,
}

impl Trigger {
    pub fn new(store: Arc<StatusStore>, starter: Arc<dyn PipelineStarter>) -> Self {
        Self { store, starter }
    }

    /// Attempt the `completed -> triggered` transition and, only on winning
    /// it, start the pipeline.
    ///
    /// Precondition: the caller believes the record is `completed`. If it no
    /// longer is (a concurrent invocation got there first, or the record is
    /// already terminal), the outcome is `AlreadyTriggered` and nothing is
    /// started.
    pub async fn trigger(&self, project_key: &str) -> Result<TriggerOutcome> {
        let now = Utc::now();

        // Persist first. mutate_record reloads on every attempt, so a rival
        // that already triggered shows up as an invalid transition here.
        let request = match self
            .store
            .mutate_record(project_key, |record| {
                record.apply(&BatchEvent::Trigger, now)?;
                Ok(StartRequest {
                    project_key: record.project_key.clone(),
                    output_dir: record.output_dir.clone(),
                    model_name: record.model_name.clone(),
                })
            })
            .await
        {
            Ok(request) => request,
            Err(BatchwatchError::InvalidTransition { from, .. }) => {
                info!(
                    project_key,
                    current_state = %from,
                    "record no longer completed, skipping trigger"
                );
                return Ok(TriggerOutcome::AlreadyTriggered);
            }
            Err(e) => return Err(e),
        };

        // Act second. From here on the record says `triggered` regardless of
        // what the start action does.
        match self.starter.start(request).await {
            Ok(()) => {
                info!(project_key, "pipeline started");
                Ok(TriggerOutcome::Triggered)
            }
            Err(e) => {
                let err = BatchwatchError::TriggerStartFailed {
                    project_key: project_key.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %err, "record left triggered with no pipeline running");
                Ok(TriggerOutcome::StartFailed {
                    message: err.to_string(),
                })
            }
        }
    }
}
