use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::runtime::Error;
use crate::session::config::{BROWSER_ENV_VAR, DEFAULT_LAUNCH_ARGS, SessionConfig};

const ENDPOINT_PREFIX: &str = "DevTools listening on ";

const WELL_KNOWN_BINARIES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Starts a Chromium-family browser with remote debugging enabled.
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    binary: Option<PathBuf>,
    headless: bool,
    user_data_dir: Option<PathBuf>,
    extra_args: Vec<String>,
    timeout: Duration,
}

/// A running browser. The process is killed when this is dropped.
#[derive(Debug)]
pub struct BrowserProcess {
    child: Child,
    ws_url: String,
    // Held so the temporary profile outlives the browser.
    _profile: Option<TempDir>,
}

impl BrowserLauncher {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            binary: config.browser_path.clone(),
            headless: config.headless,
            user_data_dir: config.user_data_dir.clone(),
            extra_args: config.extra_args.clone(),
            timeout: config.launch_timeout,
        }
    }

    /// Binaries to try, in order: configured path, `FLAPPY_GYM_BROWSER`, then
    /// the usual install names.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.binary {
            candidates.push(path.clone());
        }
        if let Ok(path) = env::var(BROWSER_ENV_VAR) {
            if !path.trim().is_empty() {
                candidates.push(PathBuf::from(path));
            }
        }
        candidates.extend(WELL_KNOWN_BINARIES.iter().map(PathBuf::from));
        candidates
    }

    pub fn args(&self, user_data_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = DEFAULT_LAUNCH_ARGS.iter().map(|s| s.to_string()).collect();
        args.push("--remote-debugging-port=0".to_string());
        args.push(format!("--user-data-dir={}", user_data_dir.display()));
        args.push("--no-first-run".to_string());
        args.push("--no-default-browser-check".to_string());
        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
            args.push("--hide-scrollbars".to_string());
            args.push("--mute-audio".to_string());
        }
        args.extend(self.extra_args.iter().filter(|a| !a.trim().is_empty()).cloned());
        args.push("about:blank".to_string());
        args
    }

    pub async fn launch(&self) -> Result<BrowserProcess, Error> {
        let (profile_dir, profile) = match &self.user_data_dir {
            Some(dir) => (dir.clone(), None),
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("flappy-gym-")
                    .tempdir()
                    .map_err(|e| Error::SessionLaunch(format!("failed to create profile dir: {e}")))?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        let args = self.args(&profile_dir);

        let mut last_error = None;
        for candidate in self.candidates() {
            let spawned = Command::new(&candidate)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn();
            let mut child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    trace!(binary = %candidate.display(), error = %e, "browser candidate unavailable");
                    last_error = Some(format!("{}: {e}", candidate.display()));
                    continue;
                }
            };

            return match wait_for_endpoint(&mut child, self.timeout).await {
                Ok(ws_url) => {
                    info!(binary = %candidate.display(), endpoint = %ws_url, headless = self.headless, "browser launched");
                    Ok(BrowserProcess {
                        child,
                        ws_url,
                        _profile: profile,
                    })
                }
                Err(e) => {
                    let _ = child.kill().await;
                    Err(e)
                }
            };
        }

        Err(Error::SessionLaunch(format!(
            "no browser could be started ({})",
            last_error.unwrap_or_else(|| "no candidates".to_string())
        )))
    }
}

impl BrowserProcess {
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub async fn kill(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => debug!(%status, "browser already exited"),
            _ => {
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill browser");
                }
            }
        }
    }
}

/// Reads the child's stderr until Chromium prints its websocket endpoint.
async fn wait_for_endpoint(child: &mut Child, timeout: Duration) -> Result<String, Error> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::SessionLaunch("browser stderr was not captured".into()))?;
    let mut lines = BufReader::new(stderr).lines();
    let deadline = Instant::now() + timeout;

    loop {
        let line = match tokio::time::timeout_at(deadline, lines.next_line()).await {
            Err(_) => {
                return Err(Error::SessionLaunch(format!(
                    "browser did not report a DevTools endpoint within {timeout:?}"
                )));
            }
            Ok(Err(e)) => return Err(Error::SessionLaunch(format!("failed to read browser output: {e}"))),
            Ok(Ok(None)) => return Err(Error::SessionLaunch("browser exited during startup".into())),
            Ok(Ok(Some(line))) => line,
        };
        if let Some(url) = parse_endpoint(&line) {
            // Keep draining so a chatty browser never blocks on a full pipe.
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(target: "flappy_gym::browser", "{line}");
                }
            });
            return Ok(url);
        }
        trace!(target: "flappy_gym::browser", "{line}");
    }
}

pub(crate) fn parse_endpoint(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix(ENDPOINT_PREFIX)?;
    let url = rest.split_whitespace().next()?;
    url.starts_with("ws://").then(|| url.to_string())
}
