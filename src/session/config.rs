use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::BridgeConfig;

pub const DEFAULT_GAME_URL: &str = "https://fabito.github.io/flappybird/";

/// Chromium flags every session is launched with.
pub const DEFAULT_LAUNCH_ARGS: &[&str] = &["--no-sandbox", "--window-size=80,315", "--disable-infobars"];

/// Env var consulted for the browser binary when none is configured.
pub const BROWSER_ENV_VAR: &str = "FLAPPY_GYM_BROWSER";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game_url: String,
    pub headless: bool,
    /// Browser profile directory; a temporary one is created when unset.
    pub user_data_dir: Option<PathBuf>,
    pub browser_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for the browser to announce its DevTools endpoint.
    pub launch_timeout: Duration,
    /// Bound on the post-navigation wait for the game clock to start ticking.
    pub load_timeout: Duration,
    pub poll_interval: Duration,
    pub canvas_selector: String,
    pub bridge: BridgeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_url: DEFAULT_GAME_URL.to_string(),
            headless: true,
            user_data_dir: None,
            browser_path: None,
            extra_args: Vec::new(),
            viewport_width: 120,
            viewport_height: 160,
            launch_timeout: Duration::from_secs(20),
            load_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            canvas_selector: "#testCanvas".to_string(),
            bridge: BridgeConfig::default(),
        }
    }
}
