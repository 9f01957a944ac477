//! A turn-based reinforcement-learning environment around the browser game
//! Flappy Bird.
//!
//! The game runs in a page driven over the Chrome DevTools protocol. Every
//! session lives on its own worker thread behind a [`runtime::SyncBridge`],
//! so the environment API stays blocking and single-threaded from the
//! caller's point of view.

pub mod env;
pub mod runtime;
pub mod session;
pub mod snapshot;

#[cfg(feature = "python")]
mod python;

pub use env::{Action, Env, EnvConfig, EnvError, FlappyBirdEnv, RewardPolicy, StepInfo};
pub use runtime::{Error, Result};
pub use session::{GameState, GameStatus, SessionConfig, SyncSession};
pub use snapshot::{Snapshot, SnapshotFormat};
