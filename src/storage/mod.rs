//! Durable, versioned storage for the status document.
//!
//! [`backend`] defines the conditional-write contract; [`memory`] and
//! [`local`] implement it; [`status_store`] layers the document schema and
//! the bounded CAS retry loops on top.

pub mod backend;
pub mod local;
pub mod memory;
pub mod status_store;

pub use backend::{StorageBackend, VersionToken, WritePrecondition, WriteResult};
pub use local::LocalFileBackend;
pub use memory::MemoryBackend;
pub use status_store::StatusStore;
