//! Ownership and control of the automation session running the game.

pub mod blocking;
pub mod cdp;
pub mod config;
pub mod controller;
pub mod launcher;
pub mod scripts;
pub mod simulated;
pub mod traits;
pub mod types;

pub use blocking::SyncSession;
pub use cdp::CdpPage;
pub use config::{DEFAULT_GAME_URL, SessionConfig};
pub use controller::SessionController;
pub use launcher::{BrowserLauncher, BrowserProcess};
pub use simulated::{SimulatedGame, SimulatedPage, SimulationConfig};
pub use traits::Page;
pub use types::{GameState, GameStatus, StateQuery, Viewport};
