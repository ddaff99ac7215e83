//! Decision model: what happens after a failed attempt.
//!
//! Deciders are pure functions: given the attempt number and the observed
//! failure they return the next action without side effects. Carrying out
//! the decision (sleeping, re-invoking, delivering) is the governor's job.

use std::time::Duration;

use super::failure::{ErrorKind, Failure};
use crate::queue::RetryPolicy;

/// The next action for an item whose attempt just failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Sleep for `delay`, then run the next attempt.
    Retry { delay: Duration, kind: ErrorKind },

    /// Deliver the failure to the caller. Terminal.
    Deliver { kind: ErrorKind, reason: String },
}

impl Decision {
    pub fn is_retry(&self) -> bool {
        matches!(self, Decision::Retry { .. })
    }
}

/// Decides the next action from the failed attempt number and its failure.
pub trait Decider: Send + Sync {
    fn decide(&self, attempt: u32, failure: &Failure) -> Decision;
}

/// Classification + attempt ceiling + exponential backoff.
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, attempt: u32, failure: &Failure) -> Decision {
        let kind = failure.kind();
        if self.retry_policy.should_retry(attempt, kind) {
            return Decision::Retry {
                delay: self.retry_policy.next_delay(attempt),
                kind,
            };
        }

        let reason = if kind.is_retryable() {
            format!(
                "max attempts reached: {}/{}",
                attempt, self.retry_policy.max_attempts
            )
        } else {
            format!("{kind} error is not retryable")
        };
        Decision::Deliver { kind, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decider() -> DefaultDecider {
        DefaultDecider::new(RetryPolicy::new(3, Duration::from_millis(100)))
    }

    #[test]
    fn server_error_is_retried_with_backoff() {
        let d = decider();
        let failure = Failure::status(503, "unavailable");

        assert_eq!(
            d.decide(1, &failure),
            Decision::Retry {
                delay: Duration::from_millis(100),
                kind: ErrorKind::Server
            }
        );
        assert_eq!(
            d.decide(2, &failure),
            Decision::Retry {
                delay: Duration::from_millis(200),
                kind: ErrorKind::Server
            }
        );
    }

    #[test]
    fn retries_stop_at_ceiling() {
        let d = decider();
        let decision = d.decide(3, &Failure::no_response("reset"));
        match decision {
            Decision::Deliver { kind, reason } => {
                assert_eq!(kind, ErrorKind::Network);
                assert!(reason.contains("3/3"));
            }
            other => panic!("expected Deliver, got {other:?}"),
        }
    }

    #[test]
    fn auth_error_is_delivered_on_first_attempt() {
        let d = decider();
        let decision = d.decide(1, &Failure::status(401, "unauthorized"));
        assert!(!decision.is_retry());
        assert!(matches!(
            decision,
            Decision::Deliver {
                kind: ErrorKind::Auth,
                ..
            }
        ));
    }

    #[test]
    fn classification_does_not_depend_on_attempt() {
        let d = decider();
        let failure = Failure::status(404, "missing");
        for attempt in 1..=5 {
            assert!(matches!(
                d.decide(attempt, &failure),
                Decision::Deliver {
                    kind: ErrorKind::Client,
                    ..
                }
            ));
        }
    }
}
