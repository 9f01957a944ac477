pub mod bridge;
pub mod error;
pub mod result_source;
pub mod service;
mod task;

pub use bridge::{BridgeConfig, SyncBridge};
pub use error::{Error, Result};
pub use result_source::PendingResult;
pub use service::Service;
