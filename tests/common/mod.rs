//! Shared test doubles and store builders for the integration suites.

#![allow(dead_code)] // Not every suite uses every helper

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use batchwatch_core::batch_api::{BatchApi, BatchPoll};
use batchwatch_core::error::{BatchwatchError, Result};
use batchwatch_core::models::{BatchRecord, BatchType, RequestCounts};
use batchwatch_core::orchestration::{PipelineStarter, StartRequest};
use batchwatch_core::storage::{MemoryBackend, StatusStore};

/// What the mock API should answer for one batch id.
#[derive(Debug, Clone)]
pub enum PollScript {
    Pending(Option<RequestCounts>),
    Completed,
    Failed(String),
    /// Simulate an unreachable API
    TransientError,
}

/// Scriptable batch API double that records every poll it receives.
#[derive(Default)]
pub struct MockBatchApi {
    scripts: Mutex<HashMap<String, PollScript>>,
    polls: Mutex<Vec<String>>,
}

impl MockBatchApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, batch_id: &str, script: PollScript) {
        self.scripts.lock().insert(batch_id.to_string(), script);
    }

    /// Batch ids polled, in order.
    pub fn polled(&self) -> Vec<String> {
        self.polls.lock().clone()
    }
}

#[async_trait]
impl BatchApi for MockBatchApi {
    async fn poll(&self, batch_id: &str) -> Result<BatchPoll> {
        self.polls.lock().push(batch_id.to_string());
        let script = self
            .scripts
            .lock()
            .get(batch_id)
            .cloned()
            .unwrap_or(PollScript::Pending(None));
        match script {
            PollScript::Pending(counts) => Ok(BatchPoll::pending(counts)),
            PollScript::Completed => Ok(BatchPoll::completed()),
            PollScript::Failed(reason) => Ok(BatchPoll::failed(reason)),
            PollScript::TransientError => Err(BatchwatchError::transient_api(
                batch_id,
                "connection timed out",
            )),
        }
    }
}

/// Pipeline starter double that counts and records starts.
#[derive(Default)]
pub struct RecordingStarter {
    starts: Mutex<Vec<StartRequest>>,
    start_count: AtomicUsize,
    fail_next: AtomicUsize,
}

impl RecordingStarter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` start calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn starts(&self) -> Vec<StartRequest> {
        self.starts.lock().clone()
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineStarter for RecordingStarter {
    async fn start(&self, request: StartRequest) -> Result<()> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BatchwatchError::storage("job runner unavailable"));
        }
        self.start_count.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().push(request);
        Ok(())
    }
}

/// A fresh store over a shared in-memory backend.
pub fn memory_store() -> Arc<StatusStore> {
    Arc::new(StatusStore::new(
        Arc::new(MemoryBackend::new()),
        "batch_status.json",
    ))
}

/// Two stores over the SAME backend, simulating two overlapping checker
/// invocations on separate hosts.
pub fn shared_stores() -> (Arc<StatusStore>, Arc<StatusStore>) {
    let backend = Arc::new(MemoryBackend::new());
    (
        Arc::new(StatusStore::new(backend.clone(), "batch_status.json")),
        Arc::new(StatusStore::new(backend, "batch_status.json")),
    )
}

/// An `in_progress` record as the submission step would create it.
pub fn in_progress_record(project_key: &str, batch_id: &str) -> BatchRecord {
    BatchRecord::new(
        project_key,
        batch_id,
        BatchType::PromptGeneration,
        format!("output/{project_key}"),
        "claude",
        Utc::now(),
    )
}
