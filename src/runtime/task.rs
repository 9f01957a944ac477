use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::runtime::error::Error;

/// A unit of work queued for the bridge worker.
///
/// It borrows the worker's state for the duration of the returned future and
/// reports its result on its own channel.
pub(crate) trait Job<S>: Send {
    fn op(&self) -> &'static str;

    fn run<'a>(self: Box<Self>, state: &'a mut S) -> BoxFuture<'a, ()>;
}

pub(crate) struct Call<F, T> {
    op: &'static str,
    func: F,
    reply: oneshot::Sender<Result<T, Error>>,
}

impl<F, T> Call<F, T> {
    pub(crate) fn new(op: &'static str, func: F, reply: oneshot::Sender<Result<T, Error>>) -> Self {
        Self { op, func, reply }
    }
}

impl<S, F, T> Job<S> for Call<F, T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<T, Error>> + Send,
{
    fn op(&self) -> &'static str {
        self.op
    }

    fn run<'a>(self: Box<Self>, state: &'a mut S) -> BoxFuture<'a, ()> {
        let Call { op, func, reply } = *self;
        let fut = func(state);
        Box::pin(async move {
            let result = fut.await;
            if reply.send(result).is_err() {
                tracing::debug!(op, "caller went away before the result arrived");
            }
        })
    }
}
