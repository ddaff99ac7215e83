use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a governor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernorStats {
    pub pending: usize,
    pub executing: usize,
    pub max_concurrency: usize,

    /// Highest executing count observed so far.
    pub peak_executing: usize,

    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,

    /// Retries scheduled (sleeps entered), summed over all items.
    pub retries: u64,

    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub submitted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub retries: AtomicU64,
    pub peak_executing: AtomicUsize,
}

impl Counters {
    pub fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize, executing: usize, max_concurrency: usize) -> GovernorStats {
        GovernorStats {
            pending,
            executing,
            max_concurrency,
            peak_executing: self.peak_executing.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            captured_at: Utc::now(),
        }
    }
}
