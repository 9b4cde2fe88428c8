//! Per-tab debugger sessions.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, AdapterErrorKind};
use crate::metrics;
use crate::registry::SessionRegistry;
use crate::transport::{CdpTransport, CommandTarget, TransportEvent};

/// Flat-mode session id returned by `Target.attachToTarget`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub attached: bool,
}

impl TargetInfo {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// What the replay engine needs from a remote-debugging connection.
#[async_trait]
pub trait Debugger: Send + Sync {
    async fn targets(&self) -> Result<Vec<TargetInfo>, AdapterError>;

    /// Attach to `target_id`, releasing any session this debugger already holds on it.
    async fn attach(&self, target_id: &str) -> Result<SessionId, AdapterError>;

    async fn detach(&self, session: &SessionId) -> Result<(), AdapterError>;

    async fn send(
        &self,
        session: &SessionId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;

    /// Send `method`, then return the first `event` seen on `session` within `timeout`.
    /// Events raised while the command is in flight count; `None` when none arrives.
    async fn send_and_wait(
        &self,
        session: &SessionId,
        method: &str,
        params: Value,
        event: &str,
        timeout: Duration,
    ) -> Result<Option<Value>, AdapterError>;

    /// Evaluate `expression` by value, awaiting promises.
    async fn evaluate(&self, session: &SessionId, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .send(
                session,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script raised an exception")
                .to_string();
            return Err(AdapterError::new(AdapterErrorKind::ScriptException)
                .with_hint(text)
                .with_data(details.clone()));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Left-button press and release at viewport coordinates.
    async fn click_at(&self, session: &SessionId, x: f64, y: f64) -> Result<(), AdapterError> {
        for phase in ["mousePressed", "mouseReleased"] {
            self.send(
                session,
                "Input.dispatchMouseEvent",
                json!({
                    "type": phase,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                }),
            )
            .await?;
        }
        Ok(())
    }
}

/// [`Debugger`] over a [`CdpTransport`].
pub struct CdpDebugger {
    transport: Arc<dyn CdpTransport>,
    registry: SessionRegistry,
    events: broadcast::Sender<TransportEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl CdpDebugger {
    pub fn new(transport: Arc<dyn CdpTransport>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            transport,
            registry: SessionRegistry::new(),
            events,
            pump: Mutex::new(None),
        }
    }

    /// Start the transport and begin fanning its events out to waiters.
    pub async fn start(&self) -> Result<(), AdapterError> {
        self.transport.start().await?;
        let mut pump = self.pump.lock().await;
        if pump.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }
        let transport = self.transport.clone();
        let events = self.events.clone();
        *pump = Some(tokio::spawn(async move {
            while let Some(event) = transport.next_event().await {
                metrics::record_event();
                let _ = events.send(event);
            }
            debug!(target: "cdp-adapter", "event stream ended");
        }));
        Ok(())
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.pump.lock().await.take() {
            task.abort();
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    async fn command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let started = Instant::now();
        metrics::record_command(method);
        match self.transport.send_command(target, method, params).await {
            Ok(value) => {
                metrics::record_command_success(method, started.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Debugger for CdpDebugger {
    async fn targets(&self) -> Result<Vec<TargetInfo>, AdapterError> {
        let response = self
            .command(CommandTarget::Browser, "Target.getTargets", json!({}))
            .await?;
        let infos = response
            .get("targetInfos")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(infos).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("unexpected Target.getTargets payload: {err}"))
        })
    }

    async fn attach(&self, target_id: &str) -> Result<SessionId, AdapterError> {
        if let Some(stale) = self.registry.session_for(target_id) {
            if let Err(err) = self.detach(&stale).await {
                debug!(target: "cdp-adapter", session = %stale, %err, "stale session already gone");
            }
        }

        let response = self
            .command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = response
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::from)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Internal)
                    .with_hint("attachToTarget returned no sessionId")
                    .with_data(response.clone())
            })?;

        self.registry.insert(target_id, session.clone(), None);
        metrics::record_attach();
        info!(target: "cdp-adapter", target_id, session = %session, "attached");
        Ok(session)
    }

    async fn detach(&self, session: &SessionId) -> Result<(), AdapterError> {
        self.registry.remove_session(session);
        self.command(
            CommandTarget::Browser,
            "Target.detachFromTarget",
            json!({ "sessionId": session.as_str() }),
        )
        .await
        .map(|_| ())
    }

    async fn send(
        &self,
        session: &SessionId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.command(CommandTarget::Session(session.0.clone()), method, params)
            .await
    }

    async fn send_and_wait(
        &self,
        session: &SessionId,
        method: &str,
        params: Value,
        event: &str,
        timeout: Duration,
    ) -> Result<Option<Value>, AdapterError> {
        let rx = self.events.subscribe();
        self.send(session, method, params).await?;
        Ok(first_event(rx, session, event, timeout).await)
    }
}

async fn first_event(
    mut rx: broadcast::Receiver<TransportEvent>,
    session: &SessionId,
    method: &str,
    timeout: Duration,
) -> Option<Value> {
    let wanted = |event: &TransportEvent| {
        event.method == method && event.session_id.as_deref() == Some(session.as_str())
    };
    let waiter = async {
        loop {
            match rx.recv().await {
                Ok(event) if wanted(&event) => return Some(event.params),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(target: "cdp-adapter", skipped, "event waiter lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(timeout, waiter).await.ok().flatten()
}
