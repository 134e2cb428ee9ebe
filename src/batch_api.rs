//! Seam to the external batch API.
//!
//! Only the polling side lives here; submission is a separate collaborator
//! that registers records through the store. Implementations wrap whatever
//! vendor client the deployment uses and are expected to enforce their own
//! per-call timeout; the poller treats every error from this trait as
//! transient and moves on to the next record.

use crate::error::Result;
use crate::models::RequestCounts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Terminal-or-pending status reported by the batch API for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BatchPollStatus {
    /// Still validating or processing
    Pending,
    /// All requests finished; results are retrievable
    Completed,
    /// Failed, expired, or cancelled at the API side
    Failed {
        /// Vendor status word (`failed`, `expired`, `cancelled`)
        reason: String,
    },
}

impl BatchPollStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One poll answer: the lifecycle-relevant status plus advisory progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPoll {
    #[serde(flatten)]
    pub status: BatchPollStatus,
    /// Progress counts when the vendor reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_counts: Option<RequestCounts>,
}

impl BatchPoll {
    pub fn pending(request_counts: Option<RequestCounts>) -> Self {
        Self {
            status: BatchPollStatus::Pending,
            request_counts,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: BatchPollStatus::Completed,
            request_counts: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: BatchPollStatus::Failed {
                reason: reason.into(),
            },
            request_counts: None,
        }
    }
}

/// Polling client for the external batch API.
///
/// Assumed idempotent and eventually consistent: the poller may ask about
/// the same batch any number of times.
#[async_trait]
pub trait BatchApi: Send + Sync {
    /// Query the current status of a batch.
    ///
    /// Errors are reported as
    /// [`TransientApi`](crate::error::BatchwatchError::TransientApi) and
    /// deferred to the next scheduled invocation.
    async fn poll(&self, batch_id: &str) -> Result<BatchPoll>;
}
