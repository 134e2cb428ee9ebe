//! Storage backend abstraction for the status blob.
//!
//! The contract is cloud-object-storage shaped: whole-object reads and
//! conditional whole-object writes keyed on an opaque version token. The
//! token is a `String` so backends with different versioning schemes fit the
//! same seam:
//! - object stores: numeric generation or entity tag
//! - local files: content-hash token
//! - memory: monotonic counter
//!
//! Concurrency safety is entirely the compare-and-swap precondition; there is
//! no locking anywhere in the contract.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Opaque version token used for conditional writes.
pub type VersionToken = String;

/// Precondition for conditional writes (CAS operations).
#[derive(Debug, Clone)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write only if the object's version matches the given token.
    MatchesVersion(VersionToken),
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
///
/// A failed precondition is a normal result, never an `Err`: losing a CAS
/// race is expected behavior the caller handles by reloading.
#[derive(Debug, Clone)]
pub enum WriteResult {
    /// Write succeeded, returns the new version token.
    Success { version: VersionToken },
    /// Precondition failed; `current_version` is `None` when the object does
    /// not exist.
    PreconditionFailed {
        current_version: Option<VersionToken>,
    },
}

impl WriteResult {
    /// Unwrap a success, mapping a precondition failure to a
    /// [`crate::error::BatchwatchError::Conflict`] at the given path.
    pub fn into_version(self, path: &str, expected: &str) -> Result<VersionToken> {
        match self {
            Self::Success { version } => Ok(version),
            Self::PreconditionFailed { current_version } => {
                Err(crate::error::BatchwatchError::conflict(
                    path,
                    expected,
                    current_version.unwrap_or_else(|| "absent".to_string()),
                ))
            }
        }
    }
}

/// Backend trait for the status blob.
///
/// All backends (memory, local file, object store adapters) implement this.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the entire object together with its version token, atomically:
    /// the token MUST correspond to exactly the returned bytes, or a
    /// caller's conditional write could pair stale content with a fresh
    /// token and clobber a concurrent update. `NotFound` if the object does
    /// not exist.
    async fn fetch(&self, path: &str) -> Result<(Bytes, VersionToken)>;

    /// Write the entire object subject to the precondition.
    ///
    /// Precondition failure is a `WriteResult` variant, not an error.
    async fn put(&self, path: &str, data: Bytes, precondition: WritePrecondition)
        -> Result<WriteResult>;

    /// Delete the object. Idempotent: succeeds when it does not exist.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Current version token, or `None` when the object does not exist.
    async fn head(&self, path: &str) -> Result<Option<VersionToken>>;
}
