//! Queue item: one admitted request plus its retry state.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::domain::{Failure, ItemState, RequestId};
use crate::error::GovernorError;
use crate::executor::Executor;

pub(crate) type Outcome<Resp> = Result<Resp, GovernorError>;

/// One unit of work owned by the governor.
///
/// Design:
/// - Retry state (attempt counter, last error, state) lives here rather than
///   on the call stack, so it can be inspected between attempts.
/// - The responder is taken on delivery; an item can resolve only once.
pub struct QueueItem<Req, Resp> {
    pub id: RequestId,
    pub request: Req,

    /// Current attempt, 1-indexed. Incremented only when a retry starts.
    pub attempt: u32,

    pub state: ItemState,

    /// Failure observed by the most recent attempt, if any.
    pub last_error: Option<Failure>,

    pub enqueued_at: Instant,

    executor: Arc<dyn Executor<Req, Resp>>,
    responder: Option<oneshot::Sender<Outcome<Resp>>>,
}

impl<Req, Resp> QueueItem<Req, Resp> {
    pub fn new(request: Req, executor: Arc<dyn Executor<Req, Resp>>) -> (Self, Ticket<Resp>) {
        let id = RequestId::generate();
        let (tx, rx) = oneshot::channel();
        let item = Self {
            id,
            request,
            attempt: 1,
            state: ItemState::Pending,
            last_error: None,
            enqueued_at: Instant::now(),
            executor,
            responder: Some(tx),
        };
        (item, Ticket { id, rx })
    }

    pub fn executor(&self) -> &Arc<dyn Executor<Req, Resp>> {
        &self.executor
    }

    /// Has the outcome already been handed to the caller?
    pub fn is_resolved(&self) -> bool {
        self.responder.is_none()
    }

    /// Pending/Sleeping -> Executing.
    pub fn begin_attempt(&mut self) {
        self.transition(ItemState::Executing);
    }

    /// Executing -> Sleeping. The next attempt number is taken immediately.
    pub fn schedule_retry(&mut self, failure: Failure) {
        self.transition(ItemState::Sleeping);
        self.last_error = Some(failure);
        self.attempt += 1;
    }

    /// Executing -> Succeeded, delivering the response.
    pub fn succeed(&mut self, response: Resp) {
        self.transition(ItemState::Succeeded);
        self.deliver(Ok(response));
    }

    /// Executing -> Failed, delivering the terminal error.
    pub fn fail(&mut self, error: GovernorError) {
        self.transition(ItemState::Failed);
        self.deliver(Err(error));
    }

    /// Executing/Sleeping -> Failed when the running task is torn down
    /// (executor panic, runtime shutdown) without resolving the item.
    pub(crate) fn abandon(&mut self, error: GovernorError) {
        debug_assert!(self.state.holds_slot(), "abandoned in {:?}", self.state);
        self.state = ItemState::Failed;
        self.deliver(Err(error));
    }

    /// Pending -> Cancelled, delivering `GovernorError::Cancelled`.
    pub fn cancel(&mut self) {
        self.transition(ItemState::Cancelled);
        self.deliver(Err(GovernorError::Cancelled));
    }

    fn transition(&mut self, next: ItemState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn deliver(&mut self, outcome: Outcome<Resp>) {
        if let Some(tx) = self.responder.take() {
            // The caller may have dropped its ticket; nothing to do then.
            let _ = tx.send(outcome);
        }
    }
}

impl<Req: fmt::Debug, Resp> fmt::Debug for QueueItem<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("attempt", &self.attempt)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// Receiving end of a submitted request.
///
/// Resolves to the executor's response, or to the final error after
/// classification and retries. Dropping the ticket does not cancel the
/// request.
#[derive(Debug)]
pub struct Ticket<Resp> {
    id: RequestId,
    rx: oneshot::Receiver<Outcome<Resp>>,
}

impl<Resp> Ticket<Resp> {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl<Resp> Future for Ticket<Resp> {
    type Output = Outcome<Resp>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                // Only reachable if the task running the item died (executor panic).
                Err(GovernorError::Unknown(Failure::other(
                    "request was dropped before it resolved",
                )))
            })
        })
    }
}
