use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use flappy_gym::runtime::Error;
use flappy_gym::session::{
    GameStatus, Page, SessionConfig, SessionController, SimulatedPage, SimulationConfig,
    StateQuery, SyncSession,
};
use flappy_gym::snapshot::{Snapshot, SnapshotFormat};
use serde_json::Value;

const NOT_LOADED: &str = "ReferenceError: createjs is not defined";

/// A simulated page whose scripts fail for a while after each navigation,
/// like a real page that is still loading, and whose close can be refused.
struct Unsteady {
    inner: SimulatedPage,
    failures_after_goto: usize,
    remaining: usize,
    close_error: Option<String>,
}

impl Unsteady {
    fn loading_for(failures: usize) -> Self {
        Self {
            inner: SimulatedPage::default(),
            failures_after_goto: failures,
            remaining: 0,
            close_error: None,
        }
    }

    fn refusing_close(reason: &str) -> Self {
        Self {
            close_error: Some(reason.to_string()),
            ..Self::loading_for(0)
        }
    }
}

#[async_trait]
impl Page for Unsteady {
    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), Error> {
        self.inner.set_viewport(width, height).await
    }

    async fn goto(&mut self, url: &str) -> Result<(), Error> {
        self.remaining = self.failures_after_goto;
        self.inner.goto(url).await
    }

    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, Error> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Err(Error::RemoteEvaluation(NOT_LOADED.into()));
        }
        self.inner.evaluate(function, args).await
    }

    async fn click(&mut self, selector: &str, delay: Duration) -> Result<(), Error> {
        self.inner.click(selector, delay).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        if let Some(reason) = self.close_error.take() {
            return Err(Error::RemoteEvaluation(reason));
        }
        self.inner.close().await
    }
}

fn fast_polling() -> SessionConfig {
    SessionConfig {
        load_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(5),
        ..SessionConfig::default()
    }
}

fn session() -> SyncSession<SimulatedPage> {
    SyncSession::with_page(SessionConfig::default(), SimulatedPage::default()).unwrap()
}

#[test]
fn sequence_ids_increase_within_one_session() {
    let session = session();
    let mut last = 0;
    for _ in 0..5 {
        let state = session.get_state(StateQuery::without_snapshot()).unwrap();
        assert_eq!(state.session_id, session.session_id());
        assert!(state.sequence_id > last);
        last = state.sequence_id;
    }
    assert_eq!(last, 5);
}

#[test]
fn snapshot_matches_the_viewport() {
    let config = SessionConfig::default();
    let (width, height) = (config.viewport_width as usize, config.viewport_height as usize);
    let session = SyncSession::with_page(config, SimulatedPage::default()).unwrap();

    let state = session
        .get_state(StateQuery::with_snapshot(SnapshotFormat::PixelArray))
        .unwrap();
    assert_eq!(state.snapshot.as_ref().and_then(Snapshot::shape), Some((height, width, 3)));
    assert_eq!(state.viewport.width as usize, width);
    assert_eq!(state.status, GameStatus::NotStarted);
    assert_eq!(state.score, 0);
}

#[test]
fn unsupported_format_leaves_the_counter_alone() {
    let session = session();
    let first = session.get_state(StateQuery::without_snapshot()).unwrap();

    let err = StateQuery::named(Some("ascii")).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));

    let next = session.get_state(StateQuery::named(Some("bytes")).unwrap()).unwrap();
    assert_eq!(next.sequence_id, first.sequence_id + 1);
    assert!(matches!(next.snapshot, Some(Snapshot::Bytes(_))));
}

#[test]
fn tap_starts_and_restart_resets_the_run() {
    let session = session();
    session.tap(Duration::ZERO).unwrap();
    let playing = session.get_state(StateQuery::without_snapshot()).unwrap();
    assert_eq!(playing.status, GameStatus::Playing);

    session.seed("7").unwrap();
    session.restart().unwrap();
    assert!(!session.is_over().unwrap());
    assert_eq!(session.get_score().unwrap(), 0);
}

#[test]
fn pause_and_resume_report_through_is_paused() {
    let session = session();
    session.pause().unwrap();
    session.pause().unwrap();
    assert!(session.is_paused().unwrap());
    session.resume().unwrap();
    assert!(!session.is_paused().unwrap());
}

#[test]
fn stop_is_idempotent_and_closes_the_session() {
    let session = session();
    session.stop().unwrap();
    session.stop().unwrap();
    assert!(session.is_closed());

    assert!(matches!(session.get_score(), Err(Error::SessionClosed)));
    assert!(matches!(
        session.get_state(StateQuery::default()),
        Err(Error::SessionClosed)
    ));
}

#[test]
fn page_that_never_ticks_times_out() {
    let config = SessionConfig {
        load_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        ..SessionConfig::default()
    };
    let page = SimulatedPage::new(SimulationConfig {
        live: false,
        ..SimulationConfig::default()
    });

    match SyncSession::with_page(config, page) {
        Err(Error::NavigationTimeout { waited, .. }) => {
            assert_eq!(waited, Duration::from_millis(200))
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("load should have timed out"),
    }
}

#[test]
fn calls_from_many_threads_are_serialized() {
    let session = session();
    let per_thread = 10;

    let ids: Vec<u64> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut seen = Vec::new();
                    for _ in 0..per_thread {
                        let state = session.get_state(StateQuery::without_snapshot()).unwrap();
                        seen.push(state.sequence_id);
                    }
                    seen
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| {
                let seen = h.join().unwrap();
                assert!(seen.windows(2).all(|w| w[0] < w[1]));
                seen
            })
            .collect()
    });

    let unique: BTreeSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(unique.into_iter().collect::<Vec<_>>(), (1..=40).collect::<Vec<_>>());
}

#[test]
fn load_waits_out_script_errors_while_the_page_loads() {
    let session = SyncSession::with_page(fast_polling(), Unsteady::loading_for(3)).unwrap();
    let state = session.get_state(StateQuery::without_snapshot()).unwrap();
    assert_eq!(state.status, GameStatus::NotStarted);

    session.load().unwrap();
    assert!(!session.is_over().unwrap());
}

#[test]
fn load_timeout_reports_the_last_script_error() {
    let config = SessionConfig {
        load_timeout: Duration::from_millis(100),
        ..fast_polling()
    };
    match SyncSession::with_page(config, Unsteady::loading_for(usize::MAX)) {
        Err(Error::NavigationTimeout { last_error, .. }) => {
            assert_eq!(last_error.as_deref(), Some(NOT_LOADED))
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("load should have timed out"),
    }
}

#[test]
fn stop_reports_a_failed_close_once() {
    let session =
        SyncSession::with_page(SessionConfig::default(), Unsteady::refusing_close("browser did not exit"))
            .unwrap();

    let err = session.stop().unwrap_err();
    assert!(matches!(err, Error::RemoteEvaluation(ref m) if m == "browser did not exit"));
    session.stop().unwrap();
    assert!(session.is_closed());
}

#[tokio::test]
async fn failed_close_leaves_the_controller_open() {
    let page = Unsteady::refusing_close("browser did not exit");
    let mut controller = SessionController::create(SessionConfig::default(), page)
        .await
        .unwrap();

    assert!(controller.stop().await.is_err());
    assert!(!controller.is_closed());
    controller.stop().await.unwrap();
    assert!(controller.is_closed());
    assert!(matches!(controller.get_score().await, Err(Error::SessionClosed)));
}
