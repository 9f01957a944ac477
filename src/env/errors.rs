use thiserror::Error;

use crate::runtime::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    /// Anything raised by the session, passed through untouched.
    #[error(transparent)]
    Session(#[from] Error),

    #[error("invalid action: {0} (expected 0 = NOOP or 1 = FLAP)")]
    InvalidAction(i64),

    #[error("action count {got} does not match environment count {expected}")]
    ActionCount { expected: usize, got: usize },

    #[error("render error: {0}")]
    Render(String),

    #[error("observation sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl EnvError {
    /// The session error behind this one, if any.
    pub fn session_error(&self) -> Option<&Error> {
        match self {
            EnvError::Session(e) => Some(e),
            _ => None,
        }
    }
}
