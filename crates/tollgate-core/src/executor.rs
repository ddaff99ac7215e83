//! Executor port: the caller-supplied function that performs the actual I/O.
//!
//! The governor treats requests and responses as opaque values. It only
//! needs "run this request, give me a response or a [`Failure`]".

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::domain::Failure;

/// Performs one attempt of a request.
///
/// Called once per attempt with the same request, so implementations must
/// not consume it. Timeouts are the executor's concern: report them as
/// `FailureCause::TimedOut`, and a caller-initiated abort as
/// `FailureCause::Aborted`.
#[async_trait]
pub trait Executor<Req, Resp>: Send + Sync {
    async fn execute(&self, request: &Req) -> Result<Resp, Failure>;
}

/// Adapts an async closure taking an owned request into an [`Executor`].
pub struct FnExecutor<F, Req> {
    f: F,
    _req: PhantomData<fn(Req)>,
}

impl<F, Req> FnExecutor<F, Req> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _req: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, Req, Resp> Executor<Req, Resp> for FnExecutor<F, Req>
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Failure>> + Send + 'static,
    Req: Clone + Send + Sync + 'static,
    Resp: Send + 'static,
{
    async fn execute(&self, request: &Req) -> Result<Resp, Failure> {
        (self.f)(request.clone()).await
    }
}
