use serde::{Deserialize, Serialize};
use std::fmt;

/// Batch record lifecycle states.
///
/// A record only ever moves forward along
/// `in_progress -> completed -> triggered -> {done|failed}`; `failed` is also
/// reachable directly from `in_progress` when the batch API reports a
/// terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Batch submitted and awaiting completion at the external API
    InProgress,
    /// Batch API reported completion; downstream pipeline not yet started
    Completed,
    /// Downstream pipeline start has been persisted (and attempted)
    Triggered,
    /// Downstream pipeline reported success
    Done,
    /// Batch failed, expired, was cancelled, or the pipeline reported failure
    Failed,
}

impl BatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if this record still occupies its batch id; two live records
    /// may never share one.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::InProgress | Self::Completed | Self::Triggered)
    }

    /// Check if this record should be queried against the batch API
    pub fn is_pollable(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if this record is awaiting a pipeline trigger
    pub fn is_triggerable(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Triggered => write!(f, "triggered"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for BatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "triggered" => Ok(Self::Triggered),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid batch state: {s}")),
        }
    }
}

impl Default for BatchState {
    fn default() -> Self {
        Self::InProgress
    }
}
