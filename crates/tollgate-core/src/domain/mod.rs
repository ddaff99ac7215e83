//! Domain model: ids, failure taxonomy, item states, retry decisions.

pub mod decision;
pub mod failure;
pub mod ids;
pub mod state;

pub use decision::{Decider, Decision, DefaultDecider};
pub use failure::{ErrorKind, Failure, FailureCause, classify};
pub use ids::{Id, IdMarker, RequestId};
pub use state::ItemState;
