use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::runtime::error::Error;
use crate::runtime::result_source::PendingResult;
use crate::runtime::service::Service;
use crate::runtime::task::{Call, Job};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub thread_name: String,
    /// Upper bound on `Service::shutdown` once the worker stops.
    pub teardown_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_name: "flappy-session".to_string(),
            teardown_timeout: Duration::from_secs(5),
        }
    }
}

type BoxedJob<S> = Box<dyn Job<S>>;

/// The worker thread plus the channel it reports its teardown result on.
struct Worker {
    handle: JoinHandle<()>,
    teardown: oneshot::Receiver<Result<(), Error>>,
}

/// Runs a [`Service`] on its own thread and exposes it through blocking calls.
///
/// The worker owns a current-thread tokio runtime and the service value. Calls
/// are queued on an unbounded channel and executed one at a time, in the order
/// they were submitted; the next call is not started until the previous one
/// has completed. [`SyncBridge::shutdown`] bypasses the queue, so it can stop
/// the worker while an operation is still in flight.
pub struct SyncBridge<S: Service> {
    jobs: mpsc::UnboundedSender<BoxedJob<S>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<Worker>>,
    closed: AtomicBool,
}

impl<S: Service> SyncBridge<S> {
    /// Starts the worker and blocks until `init` has produced the service.
    ///
    /// `init` runs on the worker's runtime; its error is returned unchanged.
    /// Must not be called from inside an async runtime.
    pub fn spawn<I, Fut>(config: BridgeConfig, init: I) -> Result<Self, Error>
    where
        I: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, Error>>,
    {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<BoxedJob<S>>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), Error>>();
        let (teardown_tx, teardown_rx) = oneshot::channel::<Result<(), Error>>();
        let teardown_timeout = config.teardown_timeout;

        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::SessionLaunch(format!(
                            "failed to build worker runtime: {e}"
                        ))));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let state = match init().await {
                        Ok(state) => state,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }
                    let teardown = serve(state, jobs_rx, shutdown_rx, teardown_timeout).await;
                    let _ = teardown_tx.send(teardown);
                });
            })
            .map_err(|e| Error::SessionLaunch(format!("failed to spawn worker thread: {e}")))?;

        let startup = ready_rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(Error::SessionLaunch("worker exited during startup".into())));
        if let Err(e) = startup {
            if worker.join().is_err() {
                warn!(service = S::service_name(), "worker panicked during startup");
            }
            return Err(e);
        }

        info!(service = S::service_name(), thread = %config.thread_name, "bridge worker ready");
        Ok(Self {
            jobs: jobs_tx,
            shutdown: shutdown_tx,
            worker: Mutex::new(Some(Worker {
                handle: worker,
                teardown: teardown_rx,
            })),
            closed: AtomicBool::new(false),
        })
    }

    /// Queues `func` and returns a handle to wait on.
    pub fn submit<T, F>(&self, op: &'static str, func: F) -> Result<PendingResult<T>, Error>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<T, Error>> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }
        let (reply, receiver) = oneshot::channel();
        self.jobs
            .send(Box::new(Call::new(op, func, reply)))
            .map_err(|_| Error::SessionClosed)?;
        Ok(PendingResult::new(receiver))
    }

    /// Queues `func` and blocks until the worker has run it.
    pub fn call<T, F>(&self, op: &'static str, func: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, Result<T, Error>> + Send + 'static,
    {
        self.submit(op, func)?.wait()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the worker, tears the service down and joins the thread.
    ///
    /// Whatever was in flight or still queued resolves to
    /// [`Error::SessionClosed`]. The first call returns the outcome of
    /// [`Service::shutdown`]; later calls return `Ok(())`.
    pub fn shutdown(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(service = S::service_name(), "bridge shutdown requested");
        }
        let _ = self.shutdown.send(true);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut worker) = worker else {
            return Ok(());
        };
        if worker.handle.join().is_err() {
            warn!(service = S::service_name(), "bridge worker panicked");
            return Err(Error::Internal("bridge worker panicked".into()));
        }
        worker
            .teardown
            .try_recv()
            .unwrap_or_else(|_| Err(Error::Internal("worker exited without tearing down".into())))
    }
}

impl<S: Service> Drop for SyncBridge<S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(service = S::service_name(), error = %e, "bridge teardown failed");
        }
    }
}

async fn serve<S: Service>(
    mut state: S,
    mut jobs: mpsc::UnboundedReceiver<BoxedJob<S>>,
    mut shutdown: watch::Receiver<bool>,
    teardown_timeout: Duration,
) -> Result<(), Error> {
    let service = S::service_name();

    loop {
        let job = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => None,
            job = jobs.recv() => job,
        };
        let Some(job) = job else { break };

        let op = job.op();
        debug!(service, op, "bridge call started");
        let finished = tokio::select! {
            biased;
            _ = stopped(&mut shutdown) => false,
            _ = job.run(&mut state) => true,
        };
        if !finished {
            warn!(service, op, "shutdown interrupted an in-flight call");
            break;
        }
    }

    // Dropping the queue fails every pending caller with SessionClosed.
    jobs.close();
    drop(jobs);

    match tokio::time::timeout(teardown_timeout, state.shutdown()).await {
        Ok(Ok(())) => {
            info!(service, "service shut down");
            Ok(())
        }
        Ok(Err(e)) => {
            warn!(service, error = %e, "service shutdown failed");
            Err(e)
        }
        Err(_) => {
            warn!(service, timeout = ?teardown_timeout, "service shutdown timed out");
            Err(Error::Internal(format!(
                "{service} shutdown timed out after {teardown_timeout:?}"
            )))
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as a stop request too.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        log: Vec<u32>,
        shutdowns: Arc<AtomicUsize>,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl Service for Counter {
        fn service_name() -> &'static str {
            "counter"
        }

        async fn shutdown(&mut self) -> Result<(), Error> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(Error::RemoteEvaluation("close refused".into()));
            }
            Ok(())
        }
    }

    fn counter_bridge(shutdowns: Arc<AtomicUsize>) -> SyncBridge<Counter> {
        SyncBridge::spawn(BridgeConfig::default(), move || async move {
            Ok(Counter {
                log: Vec::new(),
                shutdowns,
                fail_shutdown: false,
            })
        })
        .expect("bridge should start")
    }

    #[test]
    fn call_returns_the_operation_result() {
        let bridge = counter_bridge(Arc::new(AtomicUsize::new(0)));
        let len = bridge
            .call("push", |c: &mut Counter| {
                Box::pin(async move {
                    c.log.push(7);
                    Ok(c.log.len())
                })
            })
            .unwrap();
        assert_eq!(len, 1);
    }

    #[test]
    fn errors_propagate_unchanged() {
        let bridge = counter_bridge(Arc::new(AtomicUsize::new(0)));
        let err = bridge
            .call("fail", |_: &mut Counter| {
                Box::pin(async { Err::<(), _>(Error::RemoteEvaluation("boom".into())) })
            })
            .unwrap_err();
        assert!(matches!(err, Error::RemoteEvaluation(ref m) if m == "boom"));
    }

    #[test]
    fn startup_error_is_returned() {
        let result = SyncBridge::<Counter>::spawn(BridgeConfig::default(), || async {
            Err(Error::SessionLaunch("no browser".into()))
        });
        assert!(matches!(result, Err(Error::SessionLaunch(_))));
    }

    #[test]
    fn submitted_calls_run_in_order() {
        let bridge = counter_bridge(Arc::new(AtomicUsize::new(0)));
        let pending: Vec<_> = (0..20u32)
            .map(|i| {
                bridge
                    .submit("push", move |c: &mut Counter| {
                        Box::pin(async move {
                            tokio::task::yield_now().await;
                            c.log.push(i);
                            Ok(())
                        })
                    })
                    .unwrap()
            })
            .collect();
        for p in pending {
            p.wait().unwrap();
        }
        let log = bridge
            .call("read", |c: &mut Counter| Box::pin(async move { Ok(c.log.clone()) }))
            .unwrap();
        assert_eq!(log, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shutdown_is_idempotent_and_closes_the_bridge() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = counter_bridge(shutdowns.clone());
        bridge.shutdown().unwrap();
        bridge.shutdown().unwrap();
        assert!(bridge.is_closed());
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        let err = bridge
            .call("late", |_: &mut Counter| Box::pin(async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[test]
    fn shutdown_interrupts_an_in_flight_call() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let bridge = Arc::new(counter_bridge(shutdowns.clone()));

        let caller = {
            let bridge = bridge.clone();
            thread::spawn(move || {
                bridge.call("hang", |_: &mut Counter| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(())
                    })
                })
            })
        };

        thread::sleep(Duration::from_millis(100));
        bridge.shutdown().unwrap();

        let result = caller.join().unwrap();
        assert!(matches!(result, Err(Error::SessionClosed)));
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_failure_is_reported_once() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let counted = shutdowns.clone();
        let bridge = SyncBridge::spawn(BridgeConfig::default(), move || async move {
            Ok(Counter {
                log: Vec::new(),
                shutdowns: counted,
                fail_shutdown: true,
            })
        })
        .unwrap();

        let err = bridge.shutdown().unwrap_err();
        assert!(matches!(err, Error::RemoteEvaluation(ref m) if m == "close refused"));
        bridge.shutdown().unwrap();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    struct Stuck;

    #[async_trait]
    impl Service for Stuck {
        fn service_name() -> &'static str {
            "stuck"
        }

        async fn shutdown(&mut self) -> Result<(), Error> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[test]
    fn teardown_timeout_is_an_error() {
        let config = BridgeConfig {
            teardown_timeout: Duration::from_millis(50),
            ..BridgeConfig::default()
        };
        let bridge = SyncBridge::spawn(config, || async { Ok(Stuck) }).unwrap();
        assert!(matches!(bridge.shutdown(), Err(Error::Internal(_))));
    }
}
