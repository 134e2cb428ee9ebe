use crate::models::BatchFailure;
use serde::{Deserialize, Serialize};

/// Events that can move a batch record through its lifecycle.
///
/// Each event is raised by exactly one component: the poller raises
/// `MarkCompleted`/`MarkFailed`, the trigger raises `Trigger`, and the
/// pipeline completion callback raises `ReportDone`/`ReportFailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BatchEvent {
    /// Batch API reported the batch as complete
    MarkCompleted,
    /// Batch API reported the batch as failed, expired, or cancelled
    MarkFailed(BatchFailure),
    /// Downstream pipeline start accepted (state write won the race)
    Trigger,
    /// Pipeline reported terminal success
    ReportDone,
    /// Pipeline reported terminal failure
    ReportFailed(BatchFailure),
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MarkCompleted => "mark_completed",
            Self::MarkFailed(_) => "mark_failed",
            Self::Trigger => "trigger",
            Self::ReportDone => "report_done",
            Self::ReportFailed(_) => "report_failed",
        }
    }

    /// Extract the failure detail if this event carries one
    pub fn failure(&self) -> Option<&BatchFailure> {
        match self {
            Self::MarkFailed(failure) | Self::ReportFailed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Check if this event lands the record in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MarkFailed(_) | Self::ReportDone | Self::ReportFailed(_)
        )
    }
}
