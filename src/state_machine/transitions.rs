//! Pure transition table for the batch record lifecycle.
//!
//! All components route their state changes through [`next_state`] so the
//! forward-only lifecycle is enforced in one place rather than at call sites.
//! The table is total over (state, event): anything not listed is an
//! [`BatchwatchError::InvalidTransition`].

use super::events::BatchEvent;
use super::states::BatchState;
use crate::error::{BatchwatchError, Result};

/// Determine the target state for an event against the current state.
///
/// Returns `InvalidTransition` for any pair the lifecycle does not allow:
/// transitions never skip a state and never reverse, and terminal states
/// accept no events at all.
pub fn next_state(project_key: &str, current: BatchState, event: &BatchEvent) -> Result<BatchState> {
    let target = match (current, event) {
        // Poller transitions
        (BatchState::InProgress, BatchEvent::MarkCompleted) => BatchState::Completed,
        (BatchState::InProgress, BatchEvent::MarkFailed(_)) => BatchState::Failed,

        // Trigger transition
        (BatchState::Completed, BatchEvent::Trigger) => BatchState::Triggered,

        // Pipeline completion callback transitions
        (BatchState::Triggered, BatchEvent::ReportDone) => BatchState::Done,
        (BatchState::Triggered, BatchEvent::ReportFailed(_)) => BatchState::Failed,

        // Everything else is rejected
        (from, event) => {
            return Err(BatchwatchError::invalid_transition(
                project_key,
                from.to_string(),
                event.event_type(),
            ))
        }
    };

    Ok(target)
}
