//! # Configuration System
//!
//! YAML-based, environment-aware configuration. All tunables come from
//! explicit configuration files with validated defaults; the only
//! environment variable consulted is `BATCHWATCH_ENV` (which configuration
//! overlay to apply) and `RUST_LOG` (log filtering).

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub use loader::ConfigManager;

use crate::constants::system;
use crate::error::{BatchwatchError, Result};
use crate::resilience::RetryPolicy;
use crate::storage::{LocalFileBackend, MemoryBackend, StorageBackend};

/// Root configuration structure mirroring batchwatch.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchwatchConfig {
    /// Status blob location and backend selection
    pub storage: StorageConfig,

    /// Retry budget and backoff shape for CAS loops
    pub backoff: RetryPolicy,

    /// Stale-trigger monitoring
    pub monitor: MonitorConfig,

    /// Logging output
    pub logging: LoggingConfig,

    /// External collaborator commands
    pub collaborators: CollaboratorsConfig,
}

impl Default for BatchwatchConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            backoff: RetryPolicy::default(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
            collaborators: CollaboratorsConfig::default(),
        }
    }
}

/// Commands that stand in for the external collaborators.
///
/// Both must be configured for the checker binary to run; the library
/// itself only sees the traits these commands implement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    /// Command that answers `<command...> <batch_id>` with a poll JSON
    pub batch_poll_command: Vec<String>,
    /// Command spawned (fire-and-forget) to start the downstream pipeline
    pub pipeline_start_command: Vec<String>,
    /// Per-poll timeout in seconds
    pub api_timeout_seconds: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            batch_poll_command: Vec::new(),
            pipeline_start_command: Vec::new(),
            api_timeout_seconds: 30,
        }
    }
}

/// Which backend holds the status blob, and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection: `local` (durable file) or `memory` (tests only)
    pub backend: StorageBackendKind,
    /// Root directory for the local backend
    pub root: PathBuf,
    /// Blob name within the root
    pub status_blob: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Local,
            root: PathBuf::from("./data"),
            status_blob: system::STATUS_BLOB_NAME.to_string(),
        }
    }
}

impl StorageConfig {
    /// Construct the configured backend.
    pub fn create_backend(&self) -> Arc<dyn StorageBackend> {
        match self.backend {
            StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
            StorageBackendKind::Local => Arc::new(LocalFileBackend::new(self.root.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    Memory,
    Local,
}

/// Stale-trigger monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Age in seconds past which a `triggered` record is reported stale
    pub stale_trigger_threshold_seconds: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_trigger_threshold_seconds: system::DEFAULT_STALE_TRIGGER_THRESHOLD_SECS,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for per-invocation JSON log files; console-only when unset
    pub dir: Option<PathBuf>,
}

impl BatchwatchConfig {
    /// Validate cross-field constraints. Called by the loader after merge;
    /// explicit failure beats a silently absurd runtime value.
    pub fn validate(&self) -> Result<()> {
        if self.backoff.max_attempts == 0 {
            return Err(BatchwatchError::configuration(
                "backoff.max_attempts must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter_factor) {
            return Err(BatchwatchError::configuration(
                "backoff.jitter_factor must be within 0.0..=1.0",
            ));
        }
        if self.backoff.backoff_multiplier < 1.0 {
            return Err(BatchwatchError::configuration(
                "backoff.backoff_multiplier must be >= 1.0",
            ));
        }
        if self.storage.status_blob.is_empty() {
            return Err(BatchwatchError::configuration(
                "storage.status_blob must not be empty",
            ));
        }
        if self.monitor.stale_trigger_threshold_seconds == 0 {
            return Err(BatchwatchError::configuration(
                "monitor.stale_trigger_threshold_seconds must be positive",
            ));
        }
        if self.collaborators.api_timeout_seconds == 0 {
            return Err(BatchwatchError::configuration(
                "collaborators.api_timeout_seconds must be positive",
            ));
        }
        Ok(())
    }
}
