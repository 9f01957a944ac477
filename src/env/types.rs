use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::errors::EnvError;
use crate::session::{GameState, GameStatus};

pub const ACTION_NAMES: [&str; 2] = ["NOOP", "FLAP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    Noop = 0,
    Flap = 1,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Noop, Action::Flap];

    pub fn name(self) -> &'static str {
        ACTION_NAMES[self as usize]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Action {
    type Error = EnvError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Noop),
            1 => Ok(Action::Flap),
            other => Err(EnvError::InvalidAction(other)),
        }
    }
}

impl TryFrom<u8> for Action {
    type Error = EnvError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Action::try_from(value as i64)
    }
}

/// Auxiliary data returned with every observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub score: u32,
    pub hi_score: u32,
    pub vertical_position: Option<f64>,
    pub status: GameStatus,
    pub sequence_id: u64,
}

impl From<&GameState> for StepInfo {
    fn from(state: &GameState) -> Self {
        Self {
            score: state.score,
            hi_score: state.hi_score,
            vertical_position: state.vertical_position,
            status: state.status,
            sequence_id: state.sequence_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Human,
    RgbArray,
}

impl FromStr for RenderMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(RenderMode::Human),
            "rgb_array" => Ok(RenderMode::RgbArray),
            other => Err(EnvError::Render(format!("unsupported render mode {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_their_codes() {
        assert_eq!(Action::try_from(0i64).unwrap(), Action::Noop);
        assert_eq!(Action::try_from(1u8).unwrap(), Action::Flap);
        assert!(matches!(Action::try_from(2i64), Err(EnvError::InvalidAction(2))));
        assert_eq!(Action::Flap.to_string(), "FLAP");
        assert_eq!(Action::Noop as u8, 0);
    }

    #[test]
    fn render_modes_parse() {
        assert_eq!("human".parse::<RenderMode>().unwrap(), RenderMode::Human);
        assert_eq!("rgb_array".parse::<RenderMode>().unwrap(), RenderMode::RgbArray);
        assert!("ansi".parse::<RenderMode>().is_err());
    }
}
