//! Orchestration layer: the poller, the trigger, the completion callback,
//! and the stale-trigger monitor.
//!
//! Everything here is stateless between invocations; durable state lives
//! only in the status store, and every write goes through its
//! compare-and-swap loops.

pub mod checker;
pub mod completion;
pub mod monitor;
pub mod trigger;

pub use checker::{Checker, CheckerReport};
pub use completion::CompletionReporter;
pub use monitor::{StaleTrigger, StaleTriggerMonitor};
pub use trigger::{PipelineStarter, StartRequest, Trigger, TriggerOutcome};
