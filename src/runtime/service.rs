use async_trait::async_trait;

use crate::runtime::error::Error;

/// State owned by a [`SyncBridge`](crate::runtime::SyncBridge) worker.
///
/// The worker calls `shutdown` exactly once, after the last operation has run
/// or been abandoned, so implementors can release remote resources there.
#[async_trait]
pub trait Service: Send + 'static {
    fn service_name() -> &'static str;

    async fn shutdown(&mut self) -> Result<(), Error>;
}
