//! The gym-style environment built on top of a session.

pub mod config;
pub mod errors;
pub mod flappy;
pub mod policy;
pub mod saver;
pub mod traits;
pub mod types;
pub mod vec_env;

pub use config::EnvConfig;
pub use errors::EnvError;
pub use flappy::FlappyBirdEnv;
pub use policy::{PhaseTracker, RewardPolicy, is_out_of_bounds};
pub use saver::{ImageDirSink, ObservationSaver};
pub use traits::{Env, ObservationSink, Renderer};
pub use types::{ACTION_NAMES, Action, RenderMode, StepInfo};
pub use vec_env::VecEnv;
