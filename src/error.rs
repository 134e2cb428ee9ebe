//! # Error Types
//!
//! Structured error handling for the batch status system using thiserror
//! for typed errors instead of `Box<dyn Error>` patterns.
//!
//! The taxonomy mirrors how each failure is handled:
//! - [`BatchwatchError::TransientApi`] is never retried within an invocation;
//!   the next scheduled run picks the record up again.
//! - [`BatchwatchError::Conflict`] is retried locally with bounded attempts,
//!   and only for single-record mutations.
//! - [`BatchwatchError::NotFound`] means "no status document yet" and is
//!   treated as an empty store by callers.
//! - [`BatchwatchError::CorruptState`] is fatal to the invocation and is
//!   surfaced to the operator without automatic repair.

use thiserror::Error;

/// Crate-wide error type for store, poller, and trigger operations.
#[derive(Error, Debug)]
pub enum BatchwatchError {
    /// Batch API unreachable, timed out, or returned an unusable response.
    /// Deferred to the next scheduled invocation rather than retried inline.
    #[error("Transient batch API error for batch {batch_id}: {message}")]
    TransientApi { batch_id: String, message: String },

    /// Optimistic-concurrency write lost the race: the stored version no
    /// longer matches what the writer last read.
    #[error("Version conflict on {path}: expected {expected}, found {current}")]
    Conflict {
        path: String,
        expected: String,
        current: String,
    },

    /// The status document (or a requested object) does not exist.
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// The status document exists but cannot be parsed or violates a
    /// document invariant. Never auto-repaired.
    #[error("Corrupt status document at {path}: {message}")]
    CorruptState { path: String, message: String },

    /// A state transition that the lifecycle does not allow.
    #[error("Invalid transition for {project_key}: {from} -> {to}")]
    InvalidTransition {
        project_key: String,
        from: String,
        to: String,
    },

    /// A record with this project key already exists in the document.
    #[error("Project key already registered: {project_key}")]
    DuplicateProjectKey { project_key: String },

    /// Another live record (in_progress/completed/triggered) already carries
    /// this batch id.
    #[error("Batch id {batch_id} already live under project {project_key}")]
    DuplicateBatchId {
        batch_id: String,
        project_key: String,
    },

    /// The record was flipped to `triggered` but the downstream start action
    /// failed. Surfaced for operational detection, never auto-retried.
    #[error("Pipeline start failed for {project_key} after state write: {message}")]
    TriggerStartFailed {
        project_key: String,
        message: String,
    },

    /// Retry budget for an optimistic-concurrency loop was exhausted.
    #[error("Retry budget exhausted after {attempts} attempts: {operation}")]
    RetriesExhausted { operation: String, attempts: u32 },

    /// Storage backend failure other than not-found/conflict.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Serialization or deserialization failure outside the status document
    /// itself (document parse failures become `CorruptState`).
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration loading or validation failure.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem error from the local storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchwatchError {
    /// Create a transient API error
    pub fn transient_api(batch_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientApi {
            batch_id: batch_id.into(),
            message: message.into(),
        }
    }

    /// Create a version conflict error
    pub fn conflict(
        path: impl Into<String>,
        expected: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            path: path.into(),
            expected: expected.into(),
            current: current.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a corrupt-state error
    pub fn corrupt_state(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-transition error
    pub fn invalid_transition(
        project_key: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            project_key: project_key.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for errors the optimistic-concurrency loop may retry.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True for errors that abort the whole invocation rather than a single
    /// record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CorruptState { .. } | Self::Configuration { .. }
        )
    }
}

impl From<serde_json::Error> for BatchwatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BatchwatchError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Result type alias for batchwatch operations
pub type Result<T> = std::result::Result<T, BatchwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let api_err = BatchwatchError::transient_api("b1", "connection refused");
        assert!(matches!(api_err, BatchwatchError::TransientApi { .. }));

        let conflict = BatchwatchError::conflict("batch_status.json", "3", "4");
        assert!(conflict.is_retryable_conflict());

        let corrupt = BatchwatchError::corrupt_state("batch_status.json", "not a JSON object");
        assert!(corrupt.is_fatal());
        assert!(!api_err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = BatchwatchError::conflict("batch_status.json", "7", "9");
        let display = format!("{err}");
        assert!(display.contains("Version conflict"));
        assert!(display.contains("expected 7"));
        assert!(display.contains("found 9"));

        let err = BatchwatchError::invalid_transition("ep1", "done", "triggered");
        assert!(format!("{err}").contains("done -> triggered"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: BatchwatchError = json_err.into();
        assert!(matches!(err, BatchwatchError::Serialization { .. }));
    }
}
