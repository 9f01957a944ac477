use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::runtime::Error;

/// One browser page, as seen by the session controller.
///
/// Every method is a single remote round trip. Implementations report
/// protocol and script failures as [`Error::RemoteEvaluation`], and anything
/// called after [`Page::close`] as [`Error::SessionClosed`].
#[async_trait]
pub trait Page: Send + 'static {
    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), Error>;

    async fn goto(&mut self, url: &str) -> Result<(), Error>;

    /// Calls the JavaScript function expression `function` with `args` in the
    /// page and returns its (awaited) result by value.
    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, Error>;

    /// Presses and releases the primary button over the centre of the first
    /// element matching `selector`, holding it for `delay`.
    async fn click(&mut self, selector: &str, delay: Duration) -> Result<(), Error>;

    /// Closes the page and whatever process backs it. Idempotent.
    async fn close(&mut self) -> Result<(), Error>;
}
