use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::runtime::Error;
use crate::session::config::SessionConfig;
use crate::session::launcher::{BrowserLauncher, BrowserProcess};
use crate::session::scripts;
use crate::session::traits::Page;

/// A page driven over the Chrome DevTools Protocol.
///
/// Commands go out on the browser websocket, scoped to the page through a
/// flattened target session. Responses are matched by id; events that arrive
/// in between are skipped.
pub struct CdpPage {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    target_session: Option<String>,
    next_id: u64,
    browser: Option<BrowserProcess>,
    closed: bool,
}

impl CdpPage {
    /// Launches a browser per `config` and attaches to its first page.
    pub async fn launch(config: &SessionConfig) -> Result<Self, Error> {
        let browser = BrowserLauncher::from_config(config).launch().await?;
        let mut page = match Self::connect(browser.ws_url()).await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                browser.kill().await;
                return Err(e);
            }
        };
        page.browser = Some(browser);
        Ok(page)
    }

    /// Attaches to an already running browser's websocket endpoint. The first
    /// existing page target is reused; one is created when there is none.
    pub async fn connect(ws_url: &str) -> Result<Self, Error> {
        let (socket, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::SessionLaunch(format!("cdp connect to {ws_url} failed: {e}")))?;
        let mut page = Self {
            socket,
            target_session: None,
            next_id: 1,
            browser: None,
            closed: false,
        };

        let target_id = page.pick_target().await?;
        let attached = page
            .send(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SessionLaunch("Target.attachToTarget returned no sessionId".into()))?;
        page.target_session = Some(session.to_string());

        page.call("Page.enable", json!({})).await?;
        debug!(target = %target_id, "attached to page");
        Ok(page)
    }

    async fn pick_target(&mut self) -> Result<String, Error> {
        let targets = self.send("Target.getTargets", json!({}), None).await?;
        let existing = targets
            .get("targetInfos")
            .and_then(Value::as_array)
            .and_then(|infos| {
                infos
                    .iter()
                    .find(|info| info.get("type").and_then(Value::as_str) == Some("page"))
            })
            .and_then(|info| info.get("targetId"))
            .and_then(Value::as_str);
        if let Some(id) = existing {
            return Ok(id.to_string());
        }

        let created = self
            .send("Target.createTarget", json!({ "url": "about:blank" }), None)
            .await?;
        created
            .get("targetId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::SessionLaunch("Target.createTarget returned no targetId".into()))
    }

    /// Sends `method` to the attached page.
    async fn call(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        let session = self.target_session.clone();
        self.send(method, params, session.as_deref()).await
    }

    async fn send(&mut self, method: &str, params: Value, session: Option<&str>) -> Result<Value, Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let id = self.next_id;
        self.next_id += 1;

        let mut payload = json!({ "id": id, "method": method, "params": params });
        if let Some(session) = session {
            payload["sessionId"] = json!(session);
        }
        trace!(id, method, "cdp send");
        self.socket
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| Error::RemoteEvaluation(format!("cdp send failed: {e}")))?;

        while let Some(message) = self.socket.next().await {
            let message = message.map_err(|e| Error::RemoteEvaluation(format!("cdp read failed: {e}")))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8(bytes)
                    .map_err(|e| Error::RemoteEvaluation(format!("cdp binary frame is not utf-8: {e}")))?,
                Message::Close(_) => return Err(Error::SessionClosed),
                _ => continue,
            };

            let value: Value = serde_json::from_str(&text)?;
            if value.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = value.get("error") {
                return Err(Error::RemoteEvaluation(format!("{method}: {error}")));
            }
            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
        Err(Error::SessionClosed)
    }

    async fn mouse(&mut self, kind: &str, x: f64, y: f64) -> Result<(), Error> {
        self.call(
            "Input.dispatchMouseEvent",
            json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
        )
        .await
        .map(drop)
    }
}

/// Builds the `Runtime.evaluate` expression calling `function` with `args`.
pub(crate) fn call_expression(function: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("({function})({})", args.join(", "))
}

#[async_trait]
impl Page for CdpPage {
    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), Error> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({ "width": width, "height": height, "deviceScaleFactor": 1, "mobile": false }),
        )
        .await
        .map(drop)
    }

    async fn goto(&mut self, url: &str) -> Result<(), Error> {
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            return Err(Error::RemoteEvaluation(format!("navigation to {url} failed: {reason}")));
        }
        Ok(())
    }

    async fn evaluate(&mut self, function: &str, args: &[Value]) -> Result<Value, Error> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": call_expression(function, args),
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let description = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("uncaught exception");
            return Err(Error::RemoteEvaluation(description.to_string()));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn click(&mut self, selector: &str, delay: Duration) -> Result<(), Error> {
        let center = self.evaluate(scripts::ELEMENT_CENTER, &[json!(selector)]).await?;
        let (Some(x), Some(y)) = (
            center.get("x").and_then(Value::as_f64),
            center.get("y").and_then(Value::as_f64),
        ) else {
            return Err(Error::RemoteEvaluation(format!("no element matches {selector}")));
        };

        self.mouse("mousePressed", x, y).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.mouse("mouseReleased", x, y).await
    }

    async fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.send("Browser.close", json!({}), None).await {
            debug!(error = %e, "Browser.close did not complete");
        }
        self.closed = true;
        if let Err(e) = self.socket.close(None).await {
            trace!(error = %e, "websocket close");
        }
        if let Some(mut browser) = self.browser.take() {
            browser.kill().await;
        } else {
            debug!("browser is not owned by this session, leaving it running");
        }
        Ok(())
    }
}
