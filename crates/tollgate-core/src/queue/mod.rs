//! Queue module: retry policy, queue items, and the request governor.

mod governor;
mod item;
mod retry;
mod stats;

pub use governor::RequestGovernor;
pub use item::{QueueItem, Ticket};
pub use retry::RetryPolicy;
pub use stats::GovernorStats;
