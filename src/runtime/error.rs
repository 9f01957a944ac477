use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to launch session: {0}")]
    SessionLaunch(String),

    #[error(
        "page {url} did not become ready within {waited:?}{}",
        .last_error.as_deref().map(|e| format!(" (last error: {e})")).unwrap_or_default()
    )]
    NavigationTimeout {
        url: String,
        waited: Duration,
        last_error: Option<String>,
    },

    #[error("unsupported snapshot format: {0}")]
    UnsupportedFormat(String),

    #[error("session closed")]
    SessionClosed,

    #[error("remote evaluation failed: {0}")]
    RemoteEvaluation(String),

    #[error("snapshot decode error: {0}")]
    Decode(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::sync::oneshot::error::RecvError> for Error {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Error::SessionClosed
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialize(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
