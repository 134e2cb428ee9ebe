// State machine module for the batch record lifecycle
//
// Every persisted status change in the crate routes through this module's
// transition table, so forward-only progression is a structural property
// rather than a per-call-site convention.

pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use events::BatchEvent;
pub use states::BatchState;
pub use transitions::next_state;
