//! In-memory storage backend for tests and concurrency simulations.
//!
//! Thread-safe via `parking_lot::RwLock`; version tokens are a monotonic
//! counter per path, exposed as strings. Not durable.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::backend::{StorageBackend, VersionToken, WritePrecondition, WriteResult};
use crate::error::{BatchwatchError, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    version: u64,
}

/// In-memory backend; cloning shares the underlying object map.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn fetch(&self, path: &str) -> Result<(Bytes, VersionToken)> {
        let objects = self.objects.read();
        objects
            .get(path)
            .map(|o| (o.data.clone(), o.version.to_string()))
            .ok_or_else(|| BatchwatchError::not_found(path))
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write();
        let current = objects.get(path);

        match precondition {
            WritePrecondition::DoesNotExist => {
                if let Some(obj) = current {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: Some(obj.version.to_string()),
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match current {
                Some(obj) if obj.version.to_string() != expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: Some(obj.version.to_string()),
                    });
                }
                None => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: None,
                    });
                }
                _ => {}
            },
            WritePrecondition::None => {}
        }

        let new_version = current.map_or(1, |o| o.version + 1);
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                version: new_version,
            },
        );

        Ok(WriteResult::Success {
            version: new_version.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().remove(path);
        Ok(())
    }

    async fn head(&self, path: &str) -> Result<Option<VersionToken>> {
        Ok(self.objects.read().get(path).map(|o| o.version.to_string()))
    }
}
