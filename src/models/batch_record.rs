//! Persisted state for one batch job's lifecycle.
//!
//! The wire form is JSON nested under the status document's `projects`
//! mapping, keyed by `project_key`. Timestamps are RFC 3339 UTC and stay
//! `None` until the lifecycle reaches them.

use crate::error::Result;
use crate::state_machine::{next_state, BatchEvent, BatchState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which external API/workload produced the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    /// Script/prompt generation workload
    PromptGeneration,
    /// Image synthesis workload
    ImageGeneration,
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptGeneration => write!(f, "prompt_generation"),
            Self::ImageGeneration => write!(f, "image_generation"),
        }
    }
}

impl std::str::FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prompt_generation" => Ok(Self::PromptGeneration),
            "image_generation" => Ok(Self::ImageGeneration),
            _ => Err(format!("Invalid batch type: {s}")),
        }
    }
}

/// Structured failure detail, present only on failed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Machine-readable reason (`failed`, `expired`, `cancelled`,
    /// `pipeline_failed`, ...)
    pub reason: String,
    /// Human-readable detail
    pub message: String,
}

impl BatchFailure {
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Progress snapshot from the batch API, advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    /// Total number of requests in the batch
    pub total: u32,
    /// Requests completed so far
    pub completed: u32,
    /// Requests failed so far
    pub failed: u32,
}

/// One batch job's persisted lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Unique key for the logical unit of work; also the document map key
    pub project_key: String,
    /// Opaque identifier issued by the external batch API
    pub batch_id: String,
    /// Which API/workload produced this batch
    pub batch_type: BatchType,
    /// Current lifecycle state
    pub status: BatchState,
    /// When the submission step created the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the poller observed API completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the trigger won the completed->triggered write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// When the poller last queried the batch API for this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Where downstream stages write intermediate artifacts
    pub output_dir: String,
    /// Which generation backend produced the batch's content
    pub model_name: String,
    /// Failure detail, present only when status is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchFailure>,
    /// Latest progress counts reported by the batch API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_counts: Option<RequestCounts>,
}

impl BatchRecord {
    /// Create a fresh `in_progress` record as the submission step would.
    pub fn new(
        project_key: impl Into<String>,
        batch_id: impl Into<String>,
        batch_type: BatchType,
        output_dir: impl Into<String>,
        model_name: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            batch_id: batch_id.into(),
            batch_type,
            status: BatchState::InProgress,
            submitted_at: Some(submitted_at),
            completed_at: None,
            triggered_at: None,
            finished_at: None,
            last_checked_at: None,
            output_dir: output_dir.into(),
            model_name: model_name.into(),
            error: None,
            request_counts: None,
        }
    }

    /// Apply a lifecycle event, updating status and the timestamp that event
    /// reaches. Rejects anything the transition table does not allow, leaving
    /// the record untouched.
    pub fn apply(&mut self, event: &BatchEvent, now: DateTime<Utc>) -> Result<BatchState> {
        let target = next_state(&self.project_key, self.status, event)?;
        self.status = target;
        match event {
            BatchEvent::MarkCompleted => self.completed_at = Some(now),
            BatchEvent::Trigger => self.triggered_at = Some(now),
            BatchEvent::ReportDone => self.finished_at = Some(now),
            BatchEvent::MarkFailed(failure) | BatchEvent::ReportFailed(failure) => {
                self.error = Some(failure.clone());
                self.finished_at = Some(now);
            }
        }
        Ok(target)
    }

    /// Record a poll that did not change the lifecycle state.
    pub fn touch_progress(&mut self, counts: Option<RequestCounts>, now: DateTime<Utc>) {
        self.last_checked_at = Some(now);
        if counts.is_some() {
            self.request_counts = counts;
        }
    }
}
