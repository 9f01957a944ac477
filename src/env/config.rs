use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::env::policy::RewardPolicy;
use crate::session::{SessionConfig, StateQuery};
use crate::snapshot::{ImageEncoding, SnapshotFormat};

pub const ENV_NON_HEADLESS: &str = "GYM_FB_ENV_NON_HEADLESS";
pub const ENV_OBS_AS_BYTES: &str = "GYM_FB_OBS_AS_BYTES";
pub const ENV_STAY_ALIVE_REWARD: &str = "GYM_FB_STAY_ALIVE_REWARD";
pub const ENV_DEATH_REWARD: &str = "GYM_FB_DEATH_REWARD";
pub const ENV_GAME_URL: &str = "GYM_FB_GAME_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    pub session: SessionConfig,
    /// Observations carry the encoded image bytes instead of pixels.
    pub obs_as_bytes: bool,
    /// Pause the game clock between steps, so the game only advances while
    /// a step is being taken.
    pub sleep_mode: bool,
    pub reward: RewardPolicy,
    pub snapshot_encoding: ImageEncoding,
    pub snapshot_quality: u8,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            obs_as_bytes: false,
            sleep_mode: true,
            reward: RewardPolicy::default(),
            snapshot_encoding: ImageEncoding::Jpeg,
            snapshot_quality: 30,
        }
    }
}

impl EnvConfig {
    /// Defaults overridden by the `GYM_FB_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Applies overrides from any key/value source. Flags count as set when
    /// present at all; unparsable rewards are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_NON_HEADLESS).is_some() {
            self.session.headless = false;
        }
        if lookup(ENV_OBS_AS_BYTES).is_some() {
            self.obs_as_bytes = true;
        }
        if let Some(value) = parse_reward(&lookup, ENV_STAY_ALIVE_REWARD) {
            self.reward.set_stay_alive_reward(value);
        }
        if let Some(value) = parse_reward(&lookup, ENV_DEATH_REWARD) {
            self.reward.set_death_reward(value);
        }
        if let Some(url) = lookup(ENV_GAME_URL).filter(|u| !u.trim().is_empty()) {
            self.session.game_url = url;
        }
    }

    pub fn observation_format(&self) -> SnapshotFormat {
        if self.obs_as_bytes {
            SnapshotFormat::RawBytes
        } else {
            SnapshotFormat::PixelArray
        }
    }

    pub fn state_query(&self) -> StateQuery {
        StateQuery {
            snapshot: Some(self.observation_format()),
            encoding: self.snapshot_encoding,
            quality: self.snapshot_quality,
        }
    }
}

fn parse_reward<F>(lookup: &F, key: &str) -> Option<f32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable reward override");
            None
        }
    }
}
