use std::time::Duration;

use tracing::{debug, info};

use crate::env::config::EnvConfig;
use crate::env::errors::EnvError;
use crate::env::policy::PhaseTracker;
use crate::env::traits::{Env, Renderer};
use crate::env::types::{ACTION_NAMES, Action, RenderMode, StepInfo};
use crate::runtime::Error;
use crate::session::{CdpPage, GameState, Page, SyncSession};
use crate::snapshot::Snapshot;

/// Flappy Bird in a browser page, as a turn-based environment.
///
/// Each step resumes the game clock, optionally flaps, captures the state and
/// pauses the clock again (with `sleep_mode`), so the game only moves while a
/// step is being taken.
pub struct FlappyBirdEnv<P: Page = CdpPage> {
    config: EnvConfig,
    session: SyncSession<P>,
    tracker: PhaseTracker,
    renderer: Option<Box<dyn Renderer>>,
    closed: bool,
}

impl FlappyBirdEnv<CdpPage> {
    /// Launches a browser session for `config`.
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        let session = SyncSession::launch(config.session.clone())?;
        Self::from_session(config, session)
    }

    /// [`EnvConfig::from_env`] plus [`FlappyBirdEnv::new`].
    pub fn from_env() -> Result<Self, EnvError> {
        Self::new(EnvConfig::from_env())
    }
}

impl<P: Page> FlappyBirdEnv<P> {
    pub fn with_page(config: EnvConfig, page: P) -> Result<Self, EnvError> {
        let session = SyncSession::with_page(config.session.clone(), page)?;
        Self::from_session(config, session)
    }

    /// Wraps a running session. The initial state is whatever the page reports
    /// right now, normally `NotStarted`.
    pub fn from_session(config: EnvConfig, session: SyncSession<P>) -> Result<Self, EnvError> {
        let state = session.get_state(config.state_query())?;
        info!(
            session = %state.session_id,
            status = ?state.status,
            obs_shape = ?state.snapshot.as_ref().and_then(Snapshot::shape),
            sleep_mode = config.sleep_mode,
            "environment ready"
        );
        let mut tracker = PhaseTracker::new();
        tracker.begin(state);
        Ok(Self {
            config,
            session,
            tracker,
            renderer: None,
            closed: false,
        })
    }

    /// Restarts the game (re-seeding it first when `seed` is given) and
    /// returns the first observation of the new run.
    pub fn reset_with(&mut self, seed: Option<String>) -> Result<(Snapshot, StepInfo), EnvError> {
        if let Some(seed) = seed {
            self.session.seed(seed)?;
        }
        self.session.restart()?;
        let state = self.session.get_state(self.config.state_query())?;
        if self.config.sleep_mode {
            self.session.pause()?;
        }

        let observation = observation(&state)?;
        let info = StepInfo::from(&state);
        self.tracker.begin(state);
        Ok((observation, info))
    }

    pub fn step_action(&mut self, action: Action) -> Result<(Snapshot, f32, bool, StepInfo), EnvError> {
        if self.config.sleep_mode {
            self.session.resume()?;
        }
        if action == Action::Flap {
            self.session.tap(Duration::ZERO)?;
        }
        let state = self.session.get_state(self.config.state_query())?;
        if self.config.sleep_mode {
            self.session.pause()?;
        }

        let observation = observation(&state)?;
        let info = StepInfo::from(&state);
        let done = state.is_over();
        self.tracker.observe(state);
        let reward = self.config.reward.reward(done, &self.tracker);

        debug!(
            hi_score = info.hi_score,
            score = info.score,
            action = %action,
            reward,
            game_over = done,
            "step"
        );
        Ok((observation, reward, done, info))
    }

    /// Seed for the next reset; the running game is not affected.
    pub fn seed(&mut self, seed: impl Into<String>) -> Result<(), EnvError> {
        self.session.seed(seed).map_err(EnvError::from)
    }

    /// `RgbArray` returns the current frame as pixels; `Human` hands it to
    /// the attached renderer and returns nothing.
    pub fn render(&mut self, mode: RenderMode) -> Result<Option<Snapshot>, EnvError> {
        let frame = self
            .tracker
            .current()
            .and_then(|s| s.snapshot.as_ref())
            .ok_or_else(|| EnvError::Render("no frame captured yet".into()))?;
        match mode {
            RenderMode::RgbArray => Ok(Some(Snapshot::Pixels(frame.to_pixels()?))),
            RenderMode::Human => {
                let renderer = self
                    .renderer
                    .as_mut()
                    .ok_or_else(|| EnvError::Render("no renderer attached for human mode".into()))?;
                renderer.show(frame)?;
                Ok(None)
            }
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    pub fn action_meanings(&self) -> &'static [&'static str] {
        &ACTION_NAMES
    }

    /// `(height, width, 3)` of pixel observations; `None` for raw bytes.
    pub fn observation_shape(&self) -> Option<(usize, usize, usize)> {
        self.tracker
            .current()
            .and_then(|s| s.snapshot.as_ref())
            .and_then(Snapshot::shape)
    }

    pub fn state(&self) -> Option<&GameState> {
        self.tracker.current()
    }

    pub fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    pub fn session(&self) -> &SyncSession<P> {
        &self.session
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }
}

fn observation(state: &GameState) -> Result<Snapshot, EnvError> {
    state
        .snapshot
        .clone()
        .ok_or_else(|| EnvError::Session(Error::RemoteEvaluation("state carried no snapshot".into())))
}

impl<P: Page> Env for FlappyBirdEnv<P> {
    type Obs = Snapshot;
    type Act = Action;
    type Info = StepInfo;

    fn reset(&mut self) -> Result<Self::Obs, EnvError> {
        self.reset_with(None).map(|(observation, _)| observation)
    }

    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError> {
        self.step_action(act)
    }

    fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.close();
        }
        self.session.stop()?;
        info!(session = %self.session.session_id(), "environment closed");
        Ok(())
    }
}
