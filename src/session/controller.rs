use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::runtime::{Error, Service};
use crate::session::config::SessionConfig;
use crate::session::scripts;
use crate::session::traits::Page;
use crate::session::types::{GameState, GameStatus, RawState, StateQuery, parse_score};
use crate::snapshot;

/// Owns one page running the game and drives it through the remote protocol.
///
/// Every operation is a remote round trip (or several). The controller keeps
/// only what the page cannot tell it: the session id, the state counter and
/// the seed for the next restart.
pub struct SessionController<P: Page> {
    config: SessionConfig,
    page: P,
    session_id: Uuid,
    state_id: u64,
    seed: String,
    closed: bool,
}

impl<P: Page> SessionController<P> {
    pub fn new(config: SessionConfig, page: P) -> Self {
        Self {
            config,
            page,
            session_id: Uuid::new_v4(),
            state_id: 0,
            seed: "0".to_string(),
            closed: false,
        }
    }

    /// Wraps `page` and loads the game in it.
    pub async fn create(config: SessionConfig, page: P) -> Result<Self, Error> {
        let mut controller = Self::new(config, page);
        controller.initialize().await?;
        Ok(controller)
    }

    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn initialize(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        self.page
            .set_viewport(self.config.viewport_width, self.config.viewport_height)
            .await?;
        self.load().await
    }

    /// Navigates to the game and waits until its clock has ticked at least once.
    pub async fn load(&mut self) -> Result<(), Error> {
        self.ensure_open()?;
        let url = self.config.game_url.clone();
        self.page.goto(&url).await?;

        let waited = self.config.load_timeout;
        let mut last_error = None;
        match tokio::time::timeout(waited, self.wait_until_ticking(&mut last_error)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::NavigationTimeout {
                    url,
                    waited,
                    last_error,
                });
            }
        }
        info!(session = %self.session_id, url = %self.config.game_url, "game loaded");
        Ok(())
    }

    /// Polls the game clock. Script errors only mean the page has not finished
    /// loading yet; the latest one is kept for the timeout report.
    async fn wait_until_ticking(&mut self, last_error: &mut Option<String>) -> Result<(), Error> {
        loop {
            self.ensure_open()?;
            match self.page.evaluate(scripts::TICKS, &[]).await {
                Ok(ticks) if ticks.as_f64().unwrap_or(0.0) > 0.0 => return Ok(()),
                Ok(_) => {}
                Err(Error::RemoteEvaluation(reason)) => {
                    debug!(session = %self.session_id, error = %reason, "game not ready yet");
                    *last_error = Some(reason);
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    pub async fn tap(&mut self, delay: Duration) -> Result<(), Error> {
        self.ensure_open()?;
        let selector = self.config.canvas_selector.clone();
        self.page.click(&selector, delay).await
    }

    /// Re-seeds the page's RNG, restarts the run and taps once to start it.
    pub async fn restart(&mut self) -> Result<(), Error> {
        self.eval(scripts::RESTART, &[json!(self.seed)]).await?;
        self.tap(Duration::ZERO).await?;
        debug!(session = %self.session_id, seed = %self.seed, "restarted");
        Ok(())
    }

    pub async fn is_over(&mut self) -> Result<bool, Error> {
        let dead = self.eval(scripts::IS_DEAD, &[]).await?;
        Ok(serde_json::from_value::<Option<bool>>(dead)?.unwrap_or(false))
    }

    pub async fn is_paused(&mut self) -> Result<bool, Error> {
        let paused = self.eval(scripts::IS_PAUSED, &[]).await?;
        Ok(serde_json::from_value::<Option<bool>>(paused)?.unwrap_or(false))
    }

    pub async fn get_score(&mut self) -> Result<u32, Error> {
        let text = self.eval(scripts::SCORE_TEXT, &[]).await?;
        parse_score(&text)
    }

    pub async fn pause(&mut self) -> Result<(), Error> {
        self.eval(scripts::PAUSE, &[]).await.map(drop)
    }

    pub async fn resume(&mut self) -> Result<(), Error> {
        self.eval(scripts::RESUME, &[]).await.map(drop)
    }

    /// Reads bounds, score, phase flags, bird height and (optionally) a
    /// snapshot in a single round trip.
    ///
    /// The counter only moves once the whole state has been assembled, so a
    /// failed query leaves the controller untouched.
    pub async fn get_state(&mut self, query: StateQuery) -> Result<GameState, Error> {
        let args = [
            json!(query.snapshot.is_some()),
            json!(query.encoding.mime()),
            json!(query.quality),
        ];
        let raw: RawState = serde_json::from_value(self.eval(scripts::STATE, &args).await?)?;

        let snapshot = match (query.snapshot, raw.snapshot.as_deref()) {
            (Some(format), Some(payload)) => Some(snapshot::decode(payload, format)?),
            (Some(_), None) => {
                return Err(Error::RemoteEvaluation("page returned no snapshot".into()));
            }
            (None, _) => None,
        };
        let score = parse_score(&raw.score)?;
        let hi_score = parse_score(&raw.hiscore)?;

        self.state_id += 1;
        Ok(GameState {
            session_id: self.session_id,
            sequence_id: self.state_id,
            score,
            hi_score,
            status: GameStatus::from_flags(raw.started, raw.dead),
            snapshot,
            timestamp: SystemTime::now(),
            viewport: raw.dimensions,
            vertical_position: raw.vertical_position,
        })
    }

    /// Takes effect on the next [`restart`](Self::restart).
    pub fn seed(&mut self, value: impl Into<String>) {
        self.seed = value.into();
        debug!(session = %self.session_id, seed = %self.seed, "seed set");
    }

    pub fn current_seed(&self) -> &str {
        &self.seed
    }

    /// Closes the page. A failed close leaves the controller open, so the
    /// call can be retried.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        info!(session = %self.session_id, "stopping session");
        self.page.close().await?;
        self.closed = true;
        Ok(())
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn eval(&mut self, script: &'static str, args: &[Value]) -> Result<Value, Error> {
        self.ensure_open()?;
        self.page.evaluate(script, args).await.inspect_err(|e| {
            if !matches!(e, Error::SessionClosed) {
                warn!(session = %self.session_id, error = %e, "remote evaluation failed");
            }
        })
    }
}

#[async_trait]
impl<P: Page> Service for SessionController<P> {
    fn service_name() -> &'static str {
        "flappy-session"
    }

    async fn shutdown(&mut self) -> Result<(), Error> {
        self.stop().await
    }
}
