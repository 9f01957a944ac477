use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::{GameState, GameStatus};

/// How a step is scored. Both variants are tunable rather than fixed, since
/// reward shaping is a hyperparameter of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardPolicy {
    /// In priority order: death, bird outside `[upper_bound, lower_bound]`,
    /// otherwise staying alive.
    Survival {
        death_reward: f32,
        stay_alive_reward: f32,
        out_of_bounds_reward: f32,
        upper_bound: f64,
        lower_bound: f64,
    },
    /// Death, then `score_reward` whenever the score went up, otherwise
    /// staying alive.
    ScoreDelta {
        death_reward: f32,
        stay_alive_reward: f32,
        score_reward: f32,
    },
}

impl Default for RewardPolicy {
    fn default() -> Self {
        RewardPolicy::Survival {
            death_reward: -1.0,
            stay_alive_reward: 0.01,
            out_of_bounds_reward: -0.1,
            upper_bound: 20.0,
            lower_bound: 140.0,
        }
    }
}

impl RewardPolicy {
    pub fn score_delta() -> Self {
        RewardPolicy::ScoreDelta {
            death_reward: -1.0,
            stay_alive_reward: 0.01,
            score_reward: 1.0,
        }
    }

    pub fn death_reward(&self) -> f32 {
        match *self {
            RewardPolicy::Survival { death_reward, .. } | RewardPolicy::ScoreDelta { death_reward, .. } => {
                death_reward
            }
        }
    }

    pub fn stay_alive_reward(&self) -> f32 {
        match *self {
            RewardPolicy::Survival {
                stay_alive_reward, ..
            }
            | RewardPolicy::ScoreDelta {
                stay_alive_reward, ..
            } => stay_alive_reward,
        }
    }

    pub fn set_death_reward(&mut self, value: f32) {
        match self {
            RewardPolicy::Survival { death_reward, .. } | RewardPolicy::ScoreDelta { death_reward, .. } => {
                *death_reward = value
            }
        }
    }

    pub fn set_stay_alive_reward(&mut self, value: f32) {
        match self {
            RewardPolicy::Survival {
                stay_alive_reward, ..
            }
            | RewardPolicy::ScoreDelta {
                stay_alive_reward, ..
            } => *stay_alive_reward = value,
        }
    }

    /// Reward for arriving in `tracker`'s current state.
    pub fn reward(&self, done: bool, tracker: &PhaseTracker) -> f32 {
        if done {
            return self.death_reward();
        }
        match *self {
            RewardPolicy::Survival {
                stay_alive_reward,
                out_of_bounds_reward,
                upper_bound,
                lower_bound,
                ..
            } => {
                let position = tracker.current().and_then(|s| s.vertical_position);
                match position {
                    Some(y) if is_out_of_bounds(y, upper_bound, lower_bound) => out_of_bounds_reward,
                    _ => stay_alive_reward,
                }
            }
            RewardPolicy::ScoreDelta {
                stay_alive_reward,
                score_reward,
                ..
            } => {
                if tracker.score_diff() > 0 {
                    score_reward
                } else {
                    stay_alive_reward
                }
            }
        }
    }
}

/// Page coordinates grow downwards, so `upper_bound` is the smaller number.
/// Out of bounds means above the upper bound or below the lower one.
pub fn is_out_of_bounds(position: f64, upper_bound: f64, lower_bound: f64) -> bool {
    position < upper_bound || position > lower_bound
}

/// Keeps the previous and current state and checks each phase transition.
///
/// Transitions the game should never make (`Over` straight back to
/// `Playing`, say) are logged and counted but not corrected; the page is the
/// authority on its own state.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    previous: Option<GameState>,
    current: Option<GameState>,
    violations: u64,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run from `state` (after a restart). History is dropped,
    /// so any phase is accepted.
    pub fn begin(&mut self, state: GameState) -> &GameState {
        self.previous = None;
        self.current.insert(state)
    }

    /// Records the next state of the current run.
    pub fn observe(&mut self, state: GameState) -> &GameState {
        if let Some(current) = &self.current {
            if !current.status.can_advance_to(state.status) {
                self.violations += 1;
                warn!(
                    from = ?current.status,
                    to = ?state.status,
                    sequence = state.sequence_id,
                    "unexpected phase transition"
                );
            }
            if state.session_id == current.session_id && state.sequence_id <= current.sequence_id {
                warn!(
                    previous = current.sequence_id,
                    next = state.sequence_id,
                    "state sequence did not increase"
                );
            }
        }
        self.previous = self.current.take();
        self.current.insert(state)
    }

    pub fn current(&self) -> Option<&GameState> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&GameState> {
        self.previous.as_ref()
    }

    pub fn status(&self) -> Option<GameStatus> {
        self.current.as_ref().map(|s| s.status)
    }

    /// Current score minus previous score; 0 without a previous state.
    pub fn score_diff(&self) -> i64 {
        match (&self.previous, &self.current) {
            (Some(previous), Some(current)) => current.score as i64 - previous.score as i64,
            _ => 0,
        }
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Viewport;
    use std::time::SystemTime;
    use uuid::Uuid;

    fn state(sequence_id: u64, score: u32, status: GameStatus, y: f64) -> GameState {
        GameState {
            session_id: Uuid::nil(),
            sequence_id,
            score,
            hi_score: score,
            status,
            snapshot: None,
            timestamp: SystemTime::now(),
            viewport: Viewport::default(),
            vertical_position: Some(y),
        }
    }

    fn tracker_at(s: GameState) -> PhaseTracker {
        let mut tracker = PhaseTracker::new();
        tracker.begin(s);
        tracker
    }

    #[test]
    fn death_wins_over_everything() {
        let policy = RewardPolicy::default();
        let tracker = tracker_at(state(1, 5, GameStatus::Over, -50.0));
        assert_eq!(policy.reward(true, &tracker), -1.0);
        assert_eq!(RewardPolicy::score_delta().reward(true, &tracker), -1.0);
    }

    #[test]
    fn survival_rewards_in_and_out_of_bounds() {
        let policy = RewardPolicy::default();
        let inside = tracker_at(state(1, 0, GameStatus::Playing, 80.0));
        assert_eq!(policy.reward(false, &inside), 0.01);

        let above = tracker_at(state(1, 0, GameStatus::Playing, 5.0));
        assert_eq!(policy.reward(false, &above), -0.1);

        let below = tracker_at(state(1, 0, GameStatus::Playing, 150.0));
        assert_eq!(policy.reward(false, &below), -0.1);

        let mut unknown = state(1, 0, GameStatus::Playing, 0.0);
        unknown.vertical_position = None;
        assert_eq!(policy.reward(false, &tracker_at(unknown)), 0.01);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(!is_out_of_bounds(20.0, 20.0, 140.0));
        assert!(!is_out_of_bounds(140.0, 20.0, 140.0));
        assert!(is_out_of_bounds(19.9, 20.0, 140.0));
        assert!(is_out_of_bounds(140.1, 20.0, 140.0));
    }

    #[test]
    fn score_delta_pays_for_points() {
        let policy = RewardPolicy::score_delta();
        let mut tracker = tracker_at(state(1, 2, GameStatus::Playing, 80.0));
        assert_eq!(tracker.score_diff(), 0);
        assert_eq!(policy.reward(false, &tracker), 0.01);

        tracker.observe(state(2, 3, GameStatus::Playing, 80.0));
        assert_eq!(tracker.score_diff(), 1);
        assert_eq!(policy.reward(false, &tracker), 1.0);

        tracker.observe(state(3, 3, GameStatus::Playing, 80.0));
        assert_eq!(policy.reward(false, &tracker), 0.01);
    }

    #[test]
    fn overrides_touch_both_variants() {
        let mut policy = RewardPolicy::score_delta();
        policy.set_death_reward(-5.0);
        policy.set_stay_alive_reward(0.5);
        assert_eq!(policy.death_reward(), -5.0);
        assert_eq!(policy.stay_alive_reward(), 0.5);
    }

    #[test]
    fn illegal_transitions_are_counted_not_rewritten() {
        let mut tracker = tracker_at(state(1, 0, GameStatus::Playing, 80.0));
        tracker.observe(state(2, 0, GameStatus::Over, 140.0));
        assert_eq!(tracker.violations(), 0);

        tracker.observe(state(3, 0, GameStatus::Playing, 80.0));
        assert_eq!(tracker.violations(), 1);
        assert_eq!(tracker.status(), Some(GameStatus::Playing));

        tracker.begin(state(4, 0, GameStatus::NotStarted, 80.0));
        assert!(tracker.previous().is_none());
        assert_eq!(tracker.violations(), 1);
    }

    #[test]
    fn policy_config_round_trips_through_serde() {
        let json = serde_json::to_value(RewardPolicy::default()).unwrap();
        assert_eq!(json["kind"], "survival");
        let back: RewardPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, RewardPolicy::default());
    }
}
