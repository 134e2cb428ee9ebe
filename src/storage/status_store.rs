//! The status store: versioned document access with compare-and-swap
//! discipline.
//!
//! Every mutation is a read-modify-write against the current version token.
//! A lost race reloads and reapplies the mutation to the fresh document, so
//! a concurrent update to a *different* record is never clobbered. Loops are
//! bounded by [`RetryPolicy`]; whole-document rewrites from stale snapshots
//! are structurally impossible because every attempt starts from a fresh
//! load.

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use super::backend::{StorageBackend, VersionToken, WritePrecondition};
use crate::error::{BatchwatchError, Result};
use crate::models::{BatchRecord, StatusDocument};
use crate::resilience::RetryPolicy;

/// Versioned access to the shared status document.
pub struct StatusStore {
    backend: Arc<dyn StorageBackend>,
    path: String,
    retry: RetryPolicy,
}

impl StatusStore {
    pub fn new(backend: Arc<dyn StorageBackend>, path: impl Into<String>) -> Self {
        Self {
            backend,
            path: path.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Blob path this store reads and writes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch the current document and its version token.
    ///
    /// `NotFound` when the blob is absent (callers treat that as an empty
    /// store); `CorruptState` when it exists but cannot be parsed or violates
    /// a document invariant.
    pub async fn load(&self) -> Result<(StatusDocument, VersionToken)> {
        let (data, version) = self.backend.fetch(&self.path).await?;
        let document = self.parse(&data)?;
        Ok((document, version))
    }

    /// Like [`load`](Self::load), but an absent blob yields an empty
    /// document and no version token.
    pub async fn load_or_empty(&self) -> Result<(StatusDocument, Option<VersionToken>)> {
        match self.load().await {
            Ok((document, version)) => Ok((document, Some(version))),
            Err(BatchwatchError::NotFound { .. }) => Ok((StatusDocument::new(), None)),
            Err(e) => Err(e),
        }
    }

    /// Write the document only if the stored version still matches.
    ///
    /// `expected: None` asserts the blob does not exist yet (first write).
    /// A mismatch is returned as `Conflict` for the caller to reload and
    /// retry its mutation.
    pub async fn save(
        &self,
        document: &StatusDocument,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken> {
        let data = Bytes::from(serde_json::to_vec_pretty(document)?);
        let precondition = match expected {
            Some(token) => WritePrecondition::MatchesVersion(token.clone()),
            None => WritePrecondition::DoesNotExist,
        };
        let result = self.backend.put(&self.path, data, precondition).await?;
        let expected_str = expected.map_or("absent", |t| t.as_str());
        result.into_version(&self.path, expected_str)
    }

    /// Fetch a single record. `Ok(None)` when the document or the record is
    /// absent.
    pub async fn get_record(&self, project_key: &str) -> Result<Option<BatchRecord>> {
        let (document, _) = self.load_or_empty().await?;
        Ok(document.get(project_key).cloned())
    }

    /// Register a new record for a freshly submitted batch, enforcing the
    /// unique-project-key and unique-live-batch-id invariants. Lost CAS
    /// races are retried within the policy budget.
    pub async fn register(&self, record: BatchRecord) -> Result<VersionToken> {
        let mut attempt = 0;
        loop {
            let (mut document, version) = self.load_or_empty().await?;
            document.insert_new(record.clone())?;
            match self.save(&document, version.as_ref()).await {
                Ok(new_version) => return Ok(new_version),
                Err(e) if e.is_retryable_conflict() => {
                    self.backoff_or_fail("register", &mut attempt).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Insert or replace a record wholesale. Intended for administrative
    /// repair and tests; lifecycle code uses
    /// [`mutate_record`](Self::mutate_record).
    pub async fn upsert_record(
        &self,
        project_key: &str,
        record: BatchRecord,
    ) -> Result<VersionToken> {
        let mut attempt = 0;
        loop {
            let (mut document, version) = self.load_or_empty().await?;
            document
                .projects
                .insert(project_key.to_string(), record.clone());
            match self.save(&document, version.as_ref()).await {
                Ok(new_version) => return Ok(new_version),
                Err(e) if e.is_retryable_conflict() => {
                    self.backoff_or_fail("upsert_record", &mut attempt).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Explicitly remove a record. Returns `false` when it was not present.
    /// Records are never deleted automatically; this is the cleanup
    /// operation.
    pub async fn remove_record(&self, project_key: &str) -> Result<bool> {
        let mut attempt = 0;
        loop {
            let (mut document, version) = self.load_or_empty().await?;
            if document.projects.remove(project_key).is_none() {
                return Ok(false);
            }
            match self.save(&document, version.as_ref()).await {
                Ok(_) => return Ok(true),
                Err(e) if e.is_retryable_conflict() => {
                    self.backoff_or_fail("remove_record", &mut attempt).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The single-record read-modify-write loop every lifecycle component
    /// uses. Each attempt reloads the document and applies `mutate` to the
    /// current copy of the record, so only this record's fields come from
    /// the writer; everything else is whatever the latest version holds.
    ///
    /// Non-conflict errors from `mutate` (for example `InvalidTransition`)
    /// abort the loop immediately and are returned as-is.
    pub async fn mutate_record<T, F>(&self, project_key: &str, mut mutate: F) -> Result<T>
    where
        F: FnMut(&mut BatchRecord) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let (mut document, version) = self.load_or_empty().await?;
            let record = document
                .get_mut(project_key)
                .ok_or_else(|| BatchwatchError::not_found(format!("record {project_key}")))?;
            let value = mutate(record)?;
            match self.save(&document, version.as_ref()).await {
                Ok(_) => return Ok(value),
                Err(e) if e.is_retryable_conflict() => {
                    self.backoff_or_fail("mutate_record", &mut attempt).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Best-effort refresh of `last_checked_at`/`request_counts` on a still
    /// pending record: one attempt, no retry. The data is advisory, so a
    /// lost race (or a record that changed state underneath us) is dropped.
    /// Returns whether the touch was persisted.
    pub async fn try_touch_progress(
        &self,
        project_key: &str,
        counts: Option<crate::models::RequestCounts>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool> {
        let (mut document, version) = self.load_or_empty().await?;
        let Some(record) = document.get_mut(project_key) else {
            return Ok(false);
        };
        if !record.status.is_pollable() {
            return Ok(false);
        }
        record.touch_progress(counts, now);
        match self.save(&document, version.as_ref()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_retryable_conflict() => {
                debug!(project_key, "progress touch lost the race, dropping");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn backoff_or_fail(&self, operation: &str, attempt: &mut u32) -> Result<()> {
        if !self.retry.should_retry(*attempt) {
            return Err(BatchwatchError::RetriesExhausted {
                operation: operation.to_string(),
                attempts: *attempt + 1,
            });
        }
        let delay = self.retry.delay_for(*attempt);
        debug!(
            operation,
            attempt = *attempt,
            delay_ms = delay.as_millis() as u64,
            "CAS write lost the race, retrying"
        );
        tokio::time::sleep(delay).await;
        *attempt += 1;
        Ok(())
    }

    fn parse(&self, data: &[u8]) -> Result<StatusDocument> {
        let document: StatusDocument = serde_json::from_slice(data)
            .map_err(|e| BatchwatchError::corrupt_state(&self.path, e.to_string()))?;
        document
            .validate()
            .map_err(|message| BatchwatchError::corrupt_state(&self.path, message))?;
        Ok(document)
    }
}
