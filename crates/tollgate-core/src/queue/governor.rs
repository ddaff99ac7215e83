//! RequestGovernor: bounded-concurrency FIFO request queue with retry.
//!
//! # 構成
//! - pending: admission 順の `VecDeque<QueueItem>`（厳密な FIFO）
//! - slots: `Semaphore`（容量 = max_concurrency）。実行中と backoff 中の item が permit を保持する
//! - wake: `Notify`。submit と完了時に drain loop を起こす（ポーリングしない）
//!
//! The drain loop is spawned lazily by `submit` and exits once nothing is
//! pending and nothing is executing. Each admitted item runs in its own task
//! so the loop never waits on a single execution, only on capacity or work.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::item::{QueueItem, Ticket};
use super::retry::RetryPolicy;
use super::stats::{Counters, GovernorStats};
use crate::config::GovernorConfig;
use crate::domain::{Decider, Decision, DefaultDecider, Failure, RequestId};
use crate::error::{ConfigError, GovernorError};
use crate::executor::{Executor, FnExecutor};

/// Bounded-concurrency request queue with exponential-backoff retry.
///
/// Cloning is cheap and yields a handle to the same queue.
pub struct RequestGovernor<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
}

impl<Req, Resp> Clone for RequestGovernor<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<Req, Resp> {
    config: GovernorConfig,
    decider: Arc<dyn Decider>,
    state: Mutex<GovernorState<Req, Resp>>,
    slots: Arc<Semaphore>,
    executing: AtomicUsize,
    wake: Notify,
    counters: Counters,
}

struct GovernorState<Req, Resp> {
    pending: VecDeque<QueueItem<Req, Resp>>,
    draining: bool,
}

impl<Req, Resp> Shared<Req, Resp> {
    // Never held across an await. Every critical section leaves the state
    // consistent, so a poisoned lock is still usable.
    fn lock_state(&self) -> MutexGuard<'_, GovernorState<Req, Resp>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held concurrency slot.
///
/// Dropping it (normal completion or a panicking executor) decrements the
/// executing count, wakes the drain loop and returns the permit.
struct Slot<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
    _permit: OwnedSemaphorePermit,
}

impl<Req, Resp> Slot<Req, Resp> {
    // Caller holds the state lock, so the drain loop's exit check sees the increment.
    fn acquire(shared: &Arc<Shared<Req, Resp>>, permit: OwnedSemaphorePermit) -> Self {
        let now = shared.executing.fetch_add(1, Ordering::SeqCst) + 1;
        shared.counters.peak_executing.fetch_max(now, Ordering::Relaxed);
        Self {
            shared: Arc::clone(shared),
            _permit: permit,
        }
    }
}

impl<Req, Resp> Drop for Slot<Req, Resp> {
    fn drop(&mut self) {
        self.shared.executing.fetch_sub(1, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }
}

/// An item owned by its running task.
///
/// If the task is torn down before the item resolves (executor panic or
/// runtime shutdown), the item is failed as `Unknown` on drop and counted
/// like any other failure.
struct InFlight<Req, Resp> {
    shared: Arc<Shared<Req, Resp>>,
    item: QueueItem<Req, Resp>,
}

impl<Req, Resp> Drop for InFlight<Req, Resp> {
    fn drop(&mut self) {
        if self.item.is_resolved() {
            return;
        }
        let failure = Failure::other("request abandoned before it resolved");
        warn!(
            request_id = %self.item.id,
            attempt = self.item.attempt,
            error = %failure,
            "request failed"
        );
        self.item.abandon(GovernorError::from_failure(failure));
        Counters::bump(&self.shared.counters.failed, 1);
    }
}

impl<Req, Resp> RequestGovernor<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    pub fn new(config: GovernorConfig) -> Result<Self, ConfigError> {
        let decider = DefaultDecider::new(RetryPolicy::from_config(&config));
        Self::with_decider(config, Arc::new(decider))
    }

    /// Build a governor whose retry decisions come from `decider`.
    ///
    /// `config.max_attempts` and `config.base_delay_ms` are informational
    /// here; the decider alone decides retries.
    pub fn with_decider(
        config: GovernorConfig,
        decider: Arc<dyn Decider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, decider))
    }

    fn build(config: GovernorConfig, decider: Arc<dyn Decider>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            shared: Arc::new(Shared {
                config,
                decider,
                state: Mutex::new(GovernorState {
                    pending: VecDeque::new(),
                    draining: false,
                }),
                slots,
                executing: AtomicUsize::new(0),
                wake: Notify::new(),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.shared.config
    }

    /// Admit a request. Never fails; the returned ticket resolves exactly once.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn submit<E>(&self, request: Req, executor: E) -> Ticket<Resp>
    where
        E: Executor<Req, Resp> + 'static,
    {
        self.submit_shared(request, Arc::new(executor))
    }

    /// Like [`submit`](Self::submit) for an executor shared between many requests.
    pub fn submit_shared(
        &self,
        request: Req,
        executor: Arc<dyn Executor<Req, Resp>>,
    ) -> Ticket<Resp> {
        let (item, ticket) = QueueItem::new(request, executor);
        let id = item.id;

        let (pending, start_drain) = {
            let mut state = self.shared.lock_state();
            state.pending.push_back(item);
            let start = !state.draining;
            state.draining = true;
            (state.pending.len(), start)
        };
        Counters::bump(&self.shared.counters.submitted, 1);
        debug!(request_id = %id, pending, "request admitted");

        if start_drain {
            tokio::spawn(drain_loop(Arc::clone(&self.shared)));
        } else {
            self.shared.wake.notify_one();
        }
        ticket
    }

    /// Admit a request executed by an async closure.
    pub fn submit_fn<F, Fut>(&self, request: Req, f: F) -> Ticket<Resp>
    where
        Req: Clone,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Failure>> + Send + 'static,
    {
        self.submit(request, FnExecutor::new(f))
    }

    /// Cancel every request that has not started yet.
    ///
    /// Each one resolves with `GovernorError::Cancelled` before this returns.
    /// Requests already executing (or sleeping between attempts) are not
    /// touched. Returns the number cancelled.
    pub fn clear(&self) -> usize {
        let cancelled = {
            let mut state = self.shared.lock_state();
            let mut n = 0;
            for mut item in state.pending.drain(..) {
                item.cancel();
                n += 1;
            }
            n
        };
        Counters::bump(&self.shared.counters.cancelled, cancelled as u64);
        info!(cancelled, "pending requests cleared");
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().pending.len()
    }

    pub fn executing_count(&self) -> usize {
        self.shared.executing.load(Ordering::SeqCst)
    }

    /// Ids of pending requests, head first.
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.shared.lock_state().pending.iter().map(|i| i.id).collect()
    }

    pub fn stats(&self) -> GovernorStats {
        let pending = self.pending_count();
        self.shared.counters.snapshot(
            pending,
            self.executing_count(),
            self.shared.config.max_concurrency,
        )
    }
}

impl<Req, Resp> Default for RequestGovernor<Req, Resp>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    fn default() -> Self {
        let config = GovernorConfig::default();
        let decider = Arc::new(DefaultDecider::new(RetryPolicy::from_config(&config)));
        Self::build(config, decider)
    }
}

enum Step<Req, Resp> {
    Run(QueueItem<Req, Resp>, Slot<Req, Resp>),
    Wait,
    Exit,
}

async fn drain_loop<Req, Resp>(shared: Arc<Shared<Req, Resp>>)
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    debug!("drain loop started");
    loop {
        let Ok(permit) = Arc::clone(&shared.slots).acquire_owned().await else {
            // The semaphore is never closed; treat it as shutdown anyway.
            shared.lock_state().draining = false;
            return;
        };

        let step = {
            let mut state = shared.lock_state();
            match state.pending.pop_front() {
                Some(item) => Step::Run(item, Slot::acquire(&shared, permit)),
                None if shared.executing.load(Ordering::SeqCst) == 0 => {
                    state.draining = false;
                    Step::Exit
                }
                None => Step::Wait,
            }
        };

        match step {
            Step::Run(item, slot) => {
                tokio::spawn(run_item(Arc::clone(&shared), item, slot));
            }
            Step::Wait => shared.wake.notified().await,
            Step::Exit => {
                debug!("drain loop idle, exiting");
                return;
            }
        }
    }
}

async fn run_item<Req, Resp>(
    shared: Arc<Shared<Req, Resp>>,
    item: QueueItem<Req, Resp>,
    _slot: Slot<Req, Resp>,
) where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    let mut in_flight = InFlight {
        shared: Arc::clone(&shared),
        item,
    };
    let item = &mut in_flight.item;
    debug!(
        request_id = %item.id,
        queued_for = ?item.enqueued_at.elapsed(),
        "request started"
    );

    loop {
        item.begin_attempt();
        let executor = Arc::clone(item.executor());
        let result = executor.execute(&item.request).await;

        let failure = match result {
            Ok(response) => {
                debug!(request_id = %item.id, attempt = item.attempt, "request succeeded");
                item.succeed(response);
                Counters::bump(&shared.counters.succeeded, 1);
                return;
            }
            Err(failure) => failure,
        };

        match shared.decider.decide(item.attempt, &failure) {
            Decision::Retry { delay, kind } => {
                info!(
                    request_id = %item.id,
                    attempt = item.attempt,
                    delay = ?delay,
                    status = ?failure.status_code(),
                    %kind,
                    "retrying request"
                );
                item.schedule_retry(failure);
                Counters::bump(&shared.counters.retries, 1);
                tokio::time::sleep(delay).await;
            }
            Decision::Deliver { kind, reason } => {
                warn!(
                    request_id = %item.id,
                    attempt = item.attempt,
                    status = ?failure.status_code(),
                    %kind,
                    error = %failure,
                    reason = %reason,
                    "request failed"
                );
                item.fail(GovernorError::from_failure(failure));
                Counters::bump(&shared.counters.failed, 1);
                return;
            }
        }
    }
}
