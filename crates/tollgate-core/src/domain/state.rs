//! Item state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one queued request.
///
/// State transitions:
/// - Pending -> Executing -> Succeeded
/// - Pending -> Executing -> Failed (non-retryable, or retries exhausted)
/// - Executing -> Sleeping -> Executing (one loop per retry, bounded by max_attempts)
/// - Pending -> Cancelled (only via `clear()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Admitted, waiting for a concurrency slot.
    Pending,

    /// Holding a slot, executor call in flight.
    Executing,

    /// Holding a slot, waiting out a backoff delay.
    Sleeping,

    Succeeded,

    Failed,

    Cancelled,
}

impl ItemState {
    /// Is this a terminal state (result delivered)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ItemState::Succeeded | ItemState::Failed | ItemState::Cancelled
        )
    }

    /// Does an item in this state occupy a concurrency slot?
    pub fn holds_slot(self) -> bool {
        matches!(self, ItemState::Executing | ItemState::Sleeping)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, Executing)
                | (Pending, Cancelled)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Executing, Sleeping)
                | (Sleeping, Executing)
        )
    }
}
