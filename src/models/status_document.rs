//! The single shared status document.
//!
//! One JSON object, `{"projects": {<project_key>: <record>}}`, holding every
//! in-flight and historical batch record. All components treat it as shared
//! mutable state behind the store's compare-and-swap discipline; this module
//! only knows the schema and its invariants.

use super::batch_record::BatchRecord;
use crate::error::{BatchwatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The full set of batch records, keyed by project key.
///
/// `BTreeMap` keeps serialization deterministic so successive versions of the
/// blob diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    /// Mapping from project key to its batch record
    pub projects: BTreeMap<String, BatchRecord>,
}

impl StatusDocument {
    /// Create an empty document (the shape callers assume when the blob does
    /// not exist yet).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn get(&self, project_key: &str) -> Option<&BatchRecord> {
        self.projects.get(project_key)
    }

    pub fn get_mut(&mut self, project_key: &str) -> Option<&mut BatchRecord> {
        self.projects.get_mut(project_key)
    }

    /// Insert a new record, enforcing the document invariants: the project
    /// key must be free and no live record may already carry the batch id.
    pub fn insert_new(&mut self, record: BatchRecord) -> Result<()> {
        if self.projects.contains_key(&record.project_key) {
            return Err(BatchwatchError::DuplicateProjectKey {
                project_key: record.project_key,
            });
        }
        if let Some(holder) = self.live_holder_of(&record.batch_id) {
            return Err(BatchwatchError::DuplicateBatchId {
                batch_id: record.batch_id,
                project_key: holder.to_string(),
            });
        }
        self.projects.insert(record.project_key.clone(), record);
        Ok(())
    }

    /// Project keys of records awaiting a pipeline trigger, in key order.
    pub fn triggerable_keys(&self) -> Vec<String> {
        self.projects
            .values()
            .filter(|r| r.status.is_triggerable())
            .map(|r| r.project_key.clone())
            .collect()
    }

    /// Project keys of records the poller should query, in key order.
    pub fn pollable_keys(&self) -> Vec<String> {
        self.projects
            .values()
            .filter(|r| r.status.is_pollable())
            .map(|r| r.project_key.clone())
            .collect()
    }

    /// Validate schema-level invariants. Violations mean the document was
    /// written by something that bypassed this crate, so they are reported
    /// as corruption rather than patched over.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut live_batch_ids: BTreeMap<&str, &str> = BTreeMap::new();
        for (key, record) in &self.projects {
            if key != &record.project_key {
                return Err(format!(
                    "map key {key:?} does not match record project_key {:?}",
                    record.project_key
                ));
            }
            if record.error.is_some() && !matches!(record.status, crate::state_machine::BatchState::Failed) {
                return Err(format!(
                    "record {key:?} carries an error detail but status is {}",
                    record.status
                ));
            }
            if record.status.is_live() {
                if let Some(holder) = live_batch_ids.insert(&record.batch_id, key) {
                    return Err(format!(
                        "batch id {:?} held live by both {holder:?} and {key:?}",
                        record.batch_id
                    ));
                }
            }
        }
        Ok(())
    }

    fn live_holder_of(&self, batch_id: &str) -> Option<&str> {
        self.projects
            .values()
            .find(|r| r.status.is_live() && r.batch_id == batch_id)
            .map(|r| r.project_key.as_str())
    }
}
