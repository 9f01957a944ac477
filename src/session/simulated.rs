use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::runtime::Error;
use crate::session::scripts;
use crate::session::traits::Page;
use crate::snapshot::{self, ImageEncoding, PixelBuffer};

const CANVAS_SELECTOR: &str = "#testCanvas";
const SKY: [u8; 3] = [78, 192, 202];
const GROUND: [u8; 3] = [222, 216, 149];
const BIRD: [u8; 3] = [247, 200, 40];
const BIRD_SIZE: i64 = 6;

/// Tunables of the in-process game model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Stage size used until the controller sets a viewport.
    pub width: u32,
    pub height: u32,
    pub gravity: f64,
    pub flap_velocity: f64,
    /// Height of the ground band at the bottom of the stage.
    pub ground_height: f64,
    /// Frames that elapse per state query while the clock runs.
    pub frames_per_query: u32,
    /// Frames survived per point scored; 0 disables scoring.
    pub frames_per_point: u64,
    /// When false the clock never ticks, like a page that never finishes loading.
    pub live: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 120,
            height: 160,
            gravity: 0.5,
            flap_velocity: -4.5,
            ground_height: 20.0,
            frames_per_query: 3,
            frames_per_point: 30,
            live: true,
        }
    }
}

/// Observable state of the simulated game.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedGame {
    pub ticks: u64,
    pub paused: bool,
    pub started: bool,
    pub dead: bool,
    pub score: u32,
    pub bird_y: f64,
    pub velocity: f64,
    pub frames_alive: u64,
    pub seed: Option<String>,
    pub restarts: u32,
    pub taps: u32,
}

/// A [`Page`] that answers the remote protocol from a tiny deterministic
/// Flappy Bird model instead of a browser.
///
/// Time only passes when the state is queried with the clock running, so runs
/// are reproducible regardless of wall-clock timing.
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    config: SimulationConfig,
    game: SimulatedGame,
    viewport: Option<(u32, u32)>,
    url: Option<String>,
    evaluations: usize,
    closed: bool,
}

impl SimulatedPage {
    pub fn new(config: SimulationConfig) -> Self {
        let game = SimulatedGame::fresh(config.height as f64);
        Self {
            config,
            game,
            viewport: None,
            url: None,
            evaluations: 0,
            closed: false,
        }
    }

    pub fn game(&self) -> &SimulatedGame {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut SimulatedGame {
        &mut self.game
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Number of scripts evaluated so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn stage(&self) -> (u32, u32) {
        self.viewport.unwrap_or((self.config.width, self.config.height))
    }

    fn ground(&self) -> f64 {
        self.stage().1 as f64 - self.config.ground_height
    }

    fn advance(&mut self, frames: u32) {
        let ground = self.ground();
        for _ in 0..frames {
            self.game.ticks += 1;
            if !self.game.started || self.game.dead {
                continue;
            }
            self.game.velocity += self.config.gravity;
            self.game.bird_y += self.game.velocity;
            self.game.frames_alive += 1;
            if self.game.frames_alive.checked_rem(self.config.frames_per_point) == Some(0) {
                self.game.score += 1;
            }
            if self.game.bird_y >= ground || self.game.bird_y <= 0.0 {
                self.game.dead = true;
            }
        }
    }

    fn flap(&mut self) {
        self.game.taps += 1;
        if self.game.dead {
            return;
        }
        self.game.started = true;
        self.game.velocity = self.config.flap_velocity;
    }

    fn render(&self) -> PixelBuffer {
        let (width, height) = self.stage();
        let mut frame = PixelBuffer::filled(width, height, SKY);

        let ground = self.ground().max(0.0) as u32;
        for y in ground..height {
            for x in 0..width {
                frame.put_pixel(x, y, GROUND);
            }
        }

        let cx = width as i64 / 3;
        let cy = self.game.bird_y.round() as i64;
        for dy in 0..BIRD_SIZE {
            for dx in 0..BIRD_SIZE {
                let (x, y) = (cx + dx - BIRD_SIZE / 2, cy + dy - BIRD_SIZE / 2);
                if x >= 0 && y >= 0 {
                    frame.put_pixel(x as u32, y as u32, BIRD);
                }
            }
        }
        frame
    }

    fn state(&mut self, args: &[Value]) -> Result<Value, Error> {
        if !self.game.paused {
            self.advance(self.config.frames_per_query);
        }

        let include_snapshot = args.first().and_then(Value::as_bool).unwrap_or(false);
        let snapshot = if include_snapshot {
            let encoding = match args.get(1).and_then(Value::as_str) {
                Some("image/png") => ImageEncoding::Png,
                _ => ImageEncoding::Jpeg,
            };
            let quality = args.get(2).and_then(Value::as_u64).unwrap_or(30).min(100) as u8;
            Some(snapshot::encode(&self.render(), encoding, quality)?)
        } else {
            None
        };

        let (width, height) = self.stage();
        let score = self.game.score.to_string();
        Ok(json!({
            "dimensions": { "x": 0, "y": 0, "width": width, "height": height },
            "score": score,
            "hiscore": score,
            "started": self.game.started,
            "dead": self.game.dead,
            "verticalPosition": self.game.bird_y,
            "snapshot": snapshot,
        }))
    }
}

impl Default for SimulatedPage {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl SimulatedGame {
    fn fresh(stage_height: f64) -> Self {
        Self {
            ticks: 0,
            paused: false,
            started: false,
            dead: false,
            score: 0,
            bird_y: stage_height / 2.0,
            velocity: 0.0,
            frames_alive: 0,
            seed: None,
            restarts: 0,
            taps: 0,
        }
    }
}

#[async_trait]
impl Page for SimulatedPage {
    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        self.viewport = Some((width, height));
        self.game.bird_y = height as f64 / 2.0;
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        self.url = Some(url.to_string());
        self.game = SimulatedGame::fresh(self.stage().1 as f64);
        Ok(())
    }

    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if self.url.is_none() {
            return Err(Error::RemoteEvaluation("ReferenceError: createjs is not defined".into()));
        }
        self.evaluations += 1;

        match function {
            f if f == scripts::TICKS => {
                if self.config.live {
                    self.game.ticks += 1;
                }
                Ok(json!(self.game.ticks))
            }
            f if f == scripts::IS_PAUSED => Ok(json!(self.game.paused)),
            f if f == scripts::IS_DEAD => Ok(json!(self.game.dead)),
            f if f == scripts::SCORE_TEXT => Ok(json!(self.game.score.to_string())),
            f if f == scripts::PAUSE => {
                self.game.paused = true;
                Ok(Value::Null)
            }
            f if f == scripts::RESUME => {
                self.game.paused = false;
                Ok(Value::Null)
            }
            f if f == scripts::RESTART => {
                let seed = args.first().map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
                let (paused, ticks, restarts, taps) =
                    (self.game.paused, self.game.ticks, self.game.restarts, self.game.taps);
                self.game = SimulatedGame {
                    paused,
                    ticks,
                    seed,
                    restarts: restarts + 1,
                    taps,
                    ..SimulatedGame::fresh(self.stage().1 as f64)
                };
                Ok(Value::Null)
            }
            f if f == scripts::STATE => self.state(args),
            f if f == scripts::ELEMENT_CENTER => {
                let (width, height) = self.stage();
                match args.first().and_then(Value::as_str) {
                    Some(CANVAS_SELECTOR) => Ok(json!({ "x": width / 2, "y": height / 2 })),
                    _ => Ok(Value::Null),
                }
            }
            other => Err(Error::RemoteEvaluation(format!(
                "ReferenceError: unsupported script {other:?}"
            ))),
        }
    }

    async fn click(&mut self, selector: &str, _delay: Duration) -> Result<(), Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if selector != CANVAS_SELECTOR {
            return Err(Error::RemoteEvaluation(format!("no element matches {selector}")));
        }
        self.flap();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loaded() -> SimulatedPage {
        let mut page = SimulatedPage::default();
        page.goto("http://localhost/flappy").await.unwrap();
        page
    }

    #[tokio::test]
    async fn scripts_fail_before_navigation() {
        let mut page = SimulatedPage::default();
        let err = page.evaluate(scripts::TICKS, &[]).await.unwrap_err();
        assert!(matches!(err, Error::RemoteEvaluation(_)));
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_the_clock() {
        let mut page = loaded().await;
        page.evaluate(scripts::PAUSE, &[]).await.unwrap();
        page.evaluate(scripts::PAUSE, &[]).await.unwrap();
        assert_eq!(page.evaluate(scripts::IS_PAUSED, &[]).await.unwrap(), json!(true));

        let ticks = page.game().ticks;
        page.evaluate(scripts::STATE, &[json!(false)]).await.unwrap();
        assert_eq!(page.game().ticks, ticks);

        page.evaluate(scripts::RESUME, &[]).await.unwrap();
        page.evaluate(scripts::STATE, &[json!(false)]).await.unwrap();
        assert_eq!(page.game().ticks, ticks + 3);
    }

    #[tokio::test]
    async fn bird_falls_to_the_ground_without_flaps() {
        let mut page = loaded().await;
        page.click(CANVAS_SELECTOR, Duration::ZERO).await.unwrap();
        for _ in 0..100 {
            page.evaluate(scripts::STATE, &[json!(false)]).await.unwrap();
        }
        assert!(page.game().dead);
        assert_eq!(page.evaluate(scripts::IS_DEAD, &[]).await.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn restart_resets_the_run_and_keeps_the_seed() {
        let mut page = loaded().await;
        page.click(CANVAS_SELECTOR, Duration::ZERO).await.unwrap();
        page.evaluate(scripts::STATE, &[json!(false)]).await.unwrap();
        page.evaluate(scripts::RESTART, &[json!("42")]).await.unwrap();

        let game = page.game();
        assert!(!game.started && !game.dead);
        assert_eq!(game.seed.as_deref(), Some("42"));
        assert_eq!(game.restarts, 1);
    }

    #[tokio::test]
    async fn unknown_selectors_and_scripts_are_errors() {
        let mut page = loaded().await;
        assert!(page.click("#nope", Duration::ZERO).await.is_err());
        assert!(page.evaluate("() => window.secret", &[]).await.is_err());
    }

    #[tokio::test]
    async fn zero_frames_per_point_never_scores() {
        let mut page = SimulatedPage::new(SimulationConfig {
            frames_per_point: 0,
            ..SimulationConfig::default()
        });
        page.goto("http://localhost/flappy").await.unwrap();
        page.click(CANVAS_SELECTOR, Duration::ZERO).await.unwrap();
        for _ in 0..5 {
            page.evaluate(scripts::STATE, &[json!(false)]).await.unwrap();
        }
        assert_eq!(page.game().score, 0);
        assert_eq!(page.game().frames_alive, 15);
    }
}
