use tokio::sync::oneshot;

use crate::runtime::error::Error;

/// The caller's end of a queued bridge call.
///
/// Blocks the current thread until the worker reports. A worker that drops the
/// call without answering (shutdown mid-flight, or the thread is gone) surfaces
/// as [`Error::SessionClosed`].
#[derive(Debug)]
pub struct PendingResult<T>
where
    T: Send + 'static,
{
    receiver: oneshot::Receiver<Result<T, Error>>,
}

impl<T> PendingResult<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(receiver: oneshot::Receiver<Result<T, Error>>) -> Self {
        Self { receiver }
    }

    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T, Error> {
        self.receiver.blocking_recv()?
    }
}
