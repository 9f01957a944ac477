use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::runtime::{Error, SyncBridge};
use crate::session::cdp::CdpPage;
use crate::session::config::SessionConfig;
use crate::session::controller::SessionController;
use crate::session::traits::Page;
use crate::session::types::{GameState, StateQuery};

/// Blocking handle on a [`SessionController`] running behind a [`SyncBridge`].
///
/// Every method queues one operation and waits for it, so calls from any
/// number of threads reach the page one at a time, in the order they were
/// made. None of the methods may be called from inside an async runtime.
pub struct SyncSession<P: Page = CdpPage> {
    bridge: SyncBridge<SessionController<P>>,
    session_id: Uuid,
}

impl SyncSession<CdpPage> {
    /// Launches a browser, opens the game and waits until it is running.
    pub fn launch(config: SessionConfig) -> Result<Self, Error> {
        Self::spawn(config, |config| async move { CdpPage::launch(&config).await })
    }
}

impl<P: Page> SyncSession<P> {
    /// Drives the game through an existing page backend.
    pub fn with_page(config: SessionConfig, page: P) -> Result<Self, Error> {
        Self::spawn(config, move |_| async move { Ok(page) })
    }

    fn spawn<I, Fut>(config: SessionConfig, open_page: I) -> Result<Self, Error>
    where
        I: FnOnce(SessionConfig) -> Fut + Send + 'static,
        Fut: Future<Output = Result<P, Error>>,
    {
        let bridge_config = config.bridge.clone();
        let bridge = SyncBridge::spawn(bridge_config, move || async move {
            let page = open_page(config.clone()).await?;
            SessionController::create(config, page).await
        })?;
        let session_id = bridge.call("session_id", |s: &mut SessionController<P>| {
            Box::pin(async move { Ok(s.session_id()) })
        })?;
        Ok(Self { bridge, session_id })
    }

    /// Runs an arbitrary operation against the controller on the worker.
    pub fn call<T, F>(&self, op: &'static str, func: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut SessionController<P>) -> BoxFuture<'a, Result<T, Error>> + Send + 'static,
    {
        self.bridge.call(op, func)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn load(&self) -> Result<(), Error> {
        self.call("load", |s| Box::pin(s.load()))
    }

    pub fn tap(&self, delay: Duration) -> Result<(), Error> {
        self.call("tap", move |s| Box::pin(s.tap(delay)))
    }

    pub fn restart(&self) -> Result<(), Error> {
        self.call("restart", |s| Box::pin(s.restart()))
    }

    pub fn is_over(&self) -> Result<bool, Error> {
        self.call("is_over", |s| Box::pin(s.is_over()))
    }

    pub fn is_paused(&self) -> Result<bool, Error> {
        self.call("is_paused", |s| Box::pin(s.is_paused()))
    }

    pub fn get_score(&self) -> Result<u32, Error> {
        self.call("get_score", |s| Box::pin(s.get_score()))
    }

    pub fn pause(&self) -> Result<(), Error> {
        self.call("pause", |s| Box::pin(s.pause()))
    }

    pub fn resume(&self) -> Result<(), Error> {
        self.call("resume", |s| Box::pin(s.resume()))
    }

    pub fn get_state(&self, query: StateQuery) -> Result<GameState, Error> {
        self.call("get_state", move |s| Box::pin(s.get_state(query)))
    }

    pub fn seed(&self, value: impl Into<String>) -> Result<(), Error> {
        let value = value.into();
        self.call("seed", move |s| {
            Box::pin(async move {
                s.seed(value);
                Ok(())
            })
        })
    }

    /// Closes the session. Interrupts an operation still in flight on another
    /// thread; that caller gets [`Error::SessionClosed`]. The first call
    /// returns the page's close error, if any; later calls return `Ok(())`.
    pub fn stop(&self) -> Result<(), Error> {
        self.bridge.shutdown()
    }

    pub fn is_closed(&self) -> bool {
        self.bridge.is_closed()
    }
}
