//! Command-based collaborator adapters.
//!
//! The batch API client and the pipeline launcher are external
//! collaborators; deployments plug in whatever vendor integration they run.
//! These adapters cover the common glue case: each collaborator is an
//! operator-configured command, which keeps vendor SDKs out of this crate
//! entirely.
//!
//! - [`CommandBatchApi`] runs `<command...> <batch_id>` and parses its
//!   stdout as a [`BatchPoll`] JSON document. Any spawn failure, non-zero
//!   exit, unparseable output, or timeout is a transient API error.
//! - [`CommandPipelineStarter`] spawns `<command...>` with the start request
//!   passed through environment variables and does not wait for it: the
//!   pipeline is a long-running unit of work that reports back through the
//!   completion callback, not through its exit status.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::batch_api::{BatchApi, BatchPoll};
use crate::error::{BatchwatchError, Result};
use crate::orchestration::{PipelineStarter, StartRequest};

/// Environment variables the starter hands to the pipeline command.
pub const ENV_PROJECT_KEY: &str = "BATCHWATCH_PROJECT_KEY";
pub const ENV_OUTPUT_DIR: &str = "BATCHWATCH_OUTPUT_DIR";
pub const ENV_MODEL_NAME: &str = "BATCHWATCH_MODEL_NAME";

/// Polls the batch API by running a configured command.
pub struct CommandBatchApi {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandBatchApi {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        if command.is_empty() {
            return Err(BatchwatchError::configuration(
                "batch poll command must not be empty",
            ));
        }
        Ok(Self { command, timeout })
    }
}

#[async_trait]
impl BatchApi for CommandBatchApi {
    async fn poll(&self, batch_id: &str) -> Result<BatchPoll> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg(batch_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(batch_id, command = %self.command[0], "polling batch API");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                BatchwatchError::transient_api(
                    batch_id,
                    format!("poll command timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| BatchwatchError::transient_api(batch_id, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BatchwatchError::transient_api(
                batch_id,
                format!("poll command exited {}: {}", output.status, stderr.trim()),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| BatchwatchError::transient_api(batch_id, format!("bad poll output: {e}")))
    }
}

/// Starts the downstream pipeline by spawning a configured command.
pub struct CommandPipelineStarter {
    command: Vec<String>,
}

impl CommandPipelineStarter {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(BatchwatchError::configuration(
                "pipeline start command must not be empty",
            ));
        }
        Ok(Self { command })
    }
}

#[async_trait]
impl PipelineStarter for CommandPipelineStarter {
    async fn start(&self, request: StartRequest) -> Result<()> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .env(ENV_PROJECT_KEY, &request.project_key)
            .env(ENV_OUTPUT_DIR, &request.output_dir)
            .env(ENV_MODEL_NAME, &request.model_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Fire and forget: only the spawn itself can fail the trigger.
        let child = cmd
            .spawn()
            .map_err(|e| BatchwatchError::storage(format!("pipeline spawn failed: {e}")))?;

        info!(
            project_key = %request.project_key,
            pid = child.id(),
            "pipeline process spawned"
        );
        Ok(())
    }
}
