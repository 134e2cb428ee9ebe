#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batchwatch Core
//!
//! Completion detection and pipeline chaining for asynchronous batch jobs.
//!
//! ## Overview
//!
//! An external batch API (bulk inference, bulk rendering, ...) is given work
//! out-of-band. This crate supplies everything between submission and the
//! downstream pipeline: a durable versioned status document, a poller that
//! detects completion on a fixed schedule, and a trigger that starts the
//! downstream pipeline exactly once per completed batch.
//!
//! ## Correctness model
//!
//! The status document is shared mutable state across independently
//! scheduled, stateless invocations. Three rules keep it consistent:
//!
//! 1. **Forward-only lifecycle.** Every write routes through the
//!    [`state_machine`] transition table:
//!    `in_progress -> completed -> triggered -> {done|failed}`.
//! 2. **Optimistic concurrency.** Every write is a single-record
//!    read-modify-write against the document's version token; a lost race
//!    reloads and retries within a bounded, jittered budget. There are no
//!    locks and no whole-document rewrites from stale snapshots.
//! 3. **Persist-then-act.** The `completed -> triggered` write happens
//!    BEFORE the pipeline start action, so at most one invocation can win
//!    the write and at most one pipeline start is attempted per record,
//!    regardless of how many checker invocations overlap.
//!
//! ## Module Organization
//!
//! - [`models`] - the batch record schema and the status document
//! - [`state_machine`] - lifecycle states, events, and the transition table
//! - [`storage`] - versioned blob backends and the status store
//! - [`batch_api`] - seam to the external batch API
//! - [`orchestration`] - checker, trigger, completion callback, monitor
//! - [`adapters`] - command-based collaborator implementations
//! - [`resilience`] - bounded jittered retry for CAS loops
//! - [`config`] - YAML + environment configuration
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging setup

pub mod adapters;
pub mod batch_api;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;
pub mod storage;

pub use batch_api::{BatchApi, BatchPoll, BatchPollStatus};
pub use config::{BatchwatchConfig, ConfigManager};
pub use error::{BatchwatchError, Result};
pub use models::{BatchFailure, BatchRecord, BatchType, RequestCounts, StatusDocument};
pub use orchestration::{
    Checker, CheckerReport, CompletionReporter, PipelineStarter, StaleTrigger,
    StaleTriggerMonitor, StartRequest, Trigger, TriggerOutcome,
};
pub use state_machine::{BatchEvent, BatchState};
pub use storage::{LocalFileBackend, MemoryBackend, StatusStore, StorageBackend, VersionToken};
