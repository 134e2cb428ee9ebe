//! Local filesystem backend: a durable status blob for single-host
//! deployments.
//!
//! Version tokens are derived from file content (hash + length), so they
//! survive process restarts, unlike an in-memory counter. Writes go to a
//! temp file and rename into place so readers never observe a torn blob.
//! The check-then-rename window is closed with an in-process mutex; this
//! backend assumes one writer host, which is the deployment the local
//! variant exists for.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use super::backend::{StorageBackend, VersionToken, WritePrecondition, WriteResult};
use crate::error::{BatchwatchError, Result};

/// Filesystem-backed storage rooted at a directory.
#[derive(Debug)]
pub struct LocalFileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn token_for(data: &[u8]) -> VersionToken {
        let mut hasher = DefaultHasher::new();
        hasher.write(data);
        format!("{:016x}-{}", hasher.finish(), data.len())
    }

    fn current_token(path: &Path) -> Result<Option<VersionToken>> {
        match std::fs::read(path) {
            Ok(data) => Ok(Some(Self::token_for(&data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    async fn fetch(&self, path: &str) -> Result<(Bytes, VersionToken)> {
        let full = self.object_path(path);
        match tokio::fs::read(&full).await {
            // Token derives from the bytes just read, so data and version
            // cannot disagree even if a writer renames in concurrently.
            Ok(data) => {
                let token = Self::token_for(&data);
                Ok((Bytes::from(data), token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BatchwatchError::not_found(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let full = self.object_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Precondition check, temp write, and rename must not interleave
        // with another in-process writer.
        let _guard = self.write_lock.lock();

        let current = Self::current_token(&full)?;
        match &precondition {
            WritePrecondition::DoesNotExist => {
                if current.is_some() {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: current,
                    });
                }
            }
            WritePrecondition::MatchesVersion(expected) => match &current {
                Some(token) if token != expected => {
                    return Ok(WriteResult::PreconditionFailed {
                        current_version: current,
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

        let tmp = full.with_extension("tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, &full)?;

        Ok(WriteResult::Success {
            version: Self::token_for(&data),
        })
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.object_path(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, path: &str) -> Result<Option<VersionToken>> {
        Self::current_token(&self.object_path(path))
    }
}
