//! Websocket transport to Chromium.
//!
//! A single background loop owns the [`Connection`]; callers talk to it through a command
//! channel and receive responses on oneshots keyed by CDP call id. Events are forwarded on a
//! bounded channel and pulled with [`CdpTransport::next_event`].

use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::{future::BoxFuture, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::util::{discover_ws_url, extract_ws_url};

#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;

    /// `None` once the connection is gone.
    async fn next_event(&self) -> Option<TransportEvent>;

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

/// Transport for runs that have no browser; every command fails.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, AdapterError> {
        Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("no browser connected; cannot send {method}")))
    }
}

type LinkFactory =
    Arc<dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<BrowserLink>, AdapterError>> + Send + Sync>;

type Responder = oneshot::Sender<Result<Value, AdapterError>>;

/// Lazily connects on first use and reconnects if the link died.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Arc<Mutex<Option<Arc<BrowserLink>>>>,
    factory: LinkFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let factory: LinkFactory =
            Arc::new(|cfg: CdpConfig| Box::pin(async move { BrowserLink::open(cfg).await.map(Arc::new) }));
        Self {
            cfg,
            link: Arc::new(Mutex::new(None)),
            factory,
        }
    }

    async fn link(&self) -> Result<Arc<BrowserLink>, AdapterError> {
        let mut guard = self.link.lock().await;
        if let Some(link) = guard.as_ref().filter(|link| link.is_alive()) {
            return Ok(link.clone());
        }
        let link = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(link.clone());
        Ok(link)
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    #[cfg(test)]
    fn with_factory(cfg: CdpConfig, factory: LinkFactory) -> Self {
        Self {
            cfg,
            link: Arc::new(Mutex::new(None)),
            factory,
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let link = self.link().await?;
        link.call(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
            self.deadline(),
        )
        .await
        .map(|_| ())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.link().await {
            Ok(link) => link.next_event().await,
            Err(err) => {
                warn!(target: "cdp-transport", %err, "transport not ready");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.link()
            .await?
            .call(target, method, params, self.deadline())
            .await
    }
}

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: Responder,
}

/// One live websocket connection plus the tasks serving it.
struct BrowserLink {
    outgoing: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    pump: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl BrowserLink {
    async fn open(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = Self::endpoint(&cfg).await?;

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (outgoing, outgoing_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(512);
        let alive = Arc::new(AtomicBool::new(true));

        let pump_alive = alive.clone();
        let pump = tokio::spawn(async move {
            let result = Self::pump(conn, outgoing_rx, events_tx).await;
            pump_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-transport", %err, "connection loop ended with error");
            }
        });

        let heartbeat = Self::spawn_heartbeat(
            outgoing.clone(),
            alive.clone(),
            Duration::from_millis(cfg.heartbeat_interval_ms),
        );

        info!(target: "cdp-transport", url = %ws_url, "connected to chromium");

        Ok(Self {
            outgoing,
            events: Mutex::new(events_rx),
            pump,
            heartbeat,
            child: Mutex::new(child),
            alive,
        })
    }

    /// Websocket URL in priority order: explicit URL, discovery on a debugging port, launch.
    async fn endpoint(cfg: &CdpConfig) -> Result<(Option<Child>, String), AdapterError> {
        if let Some(url) = cfg.websocket_url.clone() {
            return Ok((None, url));
        }
        if let Some(addr) = cfg.remote_debugging_addr.as_deref() {
            let url = discover_ws_url(addr, Duration::from_millis(cfg.default_deadline_ms))
                .await
                .map_err(|err| {
                    AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("{err:#}"))
                        .retriable(true)
                })?;
            debug!(target: "cdp-transport", addr, url = %url, "discovered debugger endpoint");
            return Ok((None, url));
        }

        let mut child = Self::browser_config(cfg)?.launch().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;
        let url = extract_ws_url(&mut child)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;
        Ok((Some(child), url))
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        let internal = |hint: String| AdapterError::new(AdapterErrorKind::Internal).with_hint(hint);

        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!(
                    "chrome executable not found at {}",
                    cfg.executable.display()
                ))
                .with_data(json!({
                    "expected": cfg.executable,
                    "hint": "Set RECORDER_STUDIO_CHROME to the full path of chrome/chromium."
                })));
        }

        let profile_dir: PathBuf = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| internal(format!("failed to resolve cwd: {err}")))?
                .join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&profile_dir)
            .map_err(|err| internal(format!("failed to create user-data-dir: {err}")))?;

        let mut args = vec![
            "--disable-background-networking",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
        ];
        if cfg.headless {
            args.push("--headless=new");
        }

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
            .launch_timeout(Duration::from_secs(20))
            .args(args)
            .user_data_dir(profile_dir);
        if !cfg.headless {
            builder = builder.with_head();
        }
        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }
        builder
            .build()
            .map_err(|err| internal(format!("browser config error: {err}")))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (responder, response) = oneshot::channel();
        self.outgoing
            .send(Outgoing {
                target,
                method: method.to_string(),
                params,
                responder,
            })
            .await
            .map_err(|_| {
                AdapterError::new(AdapterErrorKind::CdpIo).with_hint("connection loop is gone")
            })?;

        match tokio::time::timeout(deadline, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("{method}: response channel closed"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(format!("{method} timed out"))
                .retriable(true)),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }

    fn spawn_heartbeat(
        outgoing: mpsc::Sender<Outgoing>,
        alive: Arc<AtomicBool>,
        every: Duration,
    ) -> Option<JoinHandle<()>> {
        if every.is_zero() {
            return None;
        }
        let patience = every.min(Duration::from_secs(5));

        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            while alive.load(Ordering::Relaxed) {
                ticker.tick().await;
                let (responder, response) = oneshot::channel();
                let probe = Outgoing {
                    target: CommandTarget::Browser,
                    method: "Browser.getVersion".to_string(),
                    params: json!({}),
                    responder,
                };
                if outgoing.send(probe).await.is_err() {
                    break;
                }
                match tokio::time::timeout(patience, response).await {
                    Ok(Ok(Ok(_))) => {}
                    Ok(Ok(Err(err))) => {
                        warn!(target: "cdp-transport", %err, "heartbeat failed");
                        break;
                    }
                    Ok(Err(_)) => break,
                    Err(_) => {
                        warn!(target: "cdp-transport", "heartbeat timed out");
                        break;
                    }
                }
            }
            debug!(target: "cdp-transport", "heartbeat stopped");
        }))
    }

    async fn pump(
        mut conn: Connection<CdpEventMessage>,
        mut outgoing: mpsc::Receiver<Outgoing>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let mut inflight: HashMap<CallId, Responder> = HashMap::new();

        loop {
            tokio::select! {
                Some(cmd) = outgoing.recv() => {
                    let session = match cmd.target {
                        CommandTarget::Browser => None,
                        CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
                    };
                    let method: MethodId = cmd.method.into();
                    match conn.submit_command(method, session, cmd.params) {
                        Ok(call_id) => {
                            inflight.insert(call_id, cmd.responder);
                        }
                        Err(err) => {
                            let err = AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string());
                            let _ = cmd.responder.send(Err(err.clone()));
                            return Err(err);
                        }
                    }
                }
                message = conn.next() => match message {
                    Some(Ok(Message::Response(resp))) => {
                        if let Some(responder) = inflight.remove(&resp.id) {
                            let _ = responder.send(Self::payload(resp));
                        }
                    }
                    Some(Ok(Message::Event(event))) => {
                        if let Err(err) = Self::forward(event, &events).await {
                            warn!(target: "cdp-transport", %err, "dropping event");
                        }
                    }
                    Some(Err(err)) => {
                        let err = Self::map_cdp_error(err);
                        for (_, responder) in inflight.drain() {
                            let _ = responder.send(Err(err.clone()));
                        }
                        return Err(err);
                    }
                    None => {
                        let err = AdapterError::new(AdapterErrorKind::CdpIo).with_hint("connection closed");
                        for (_, responder) in inflight.drain() {
                            let _ = responder.send(Err(err.clone()));
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn forward(
        event: CdpEventMessage,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let raw: CdpJsonEventMessage = event.try_into().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("undecodable event: {err}"))
        })?;
        events
            .send(TransportEvent {
                method: raw.method.into_owned(),
                params: raw.params,
                session_id: raw.session_id,
            })
            .await
            .map_err(|_| AdapterError::new(AdapterErrorKind::Internal).with_hint("event receiver dropped"))
    }

    fn payload(resp: Response) -> Result<Value, AdapterError> {
        match (resp.result, resp.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("cdp error {}: {}", error.code, error.message))
                .retriable(error.code >= 500)),
            (None, None) => {
                Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("empty cdp response"))
            }
        }
    }

    fn map_cdp_error(err: CdpError) -> AdapterError {
        let hint = err.to_string();
        match err {
            CdpError::Timeout => AdapterError::new(AdapterErrorKind::Timeout)
                .with_hint(hint)
                .retriable(true),
            CdpError::Serde(_) | CdpError::JavascriptException(_) | CdpError::FrameNotFound(_) => {
                AdapterError::new(AdapterErrorKind::Internal).with_hint(hint)
            }
            _ => AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(hint)
                .retriable(true),
        }
    }

    #[cfg(test)]
    fn detached() -> (Arc<Self>, Arc<AtomicBool>) {
        let (outgoing, _outgoing_rx) = mpsc::channel(8);
        let (_events_tx, events_rx) = mpsc::channel(8);
        let alive = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(futures::future::pending::<()>());
        (
            Arc::new(Self {
                outgoing,
                events: Mutex::new(events_rx),
                pump,
                heartbeat: None,
                child: Mutex::new(None),
                alive: alive.clone(),
            }),
            alive,
        )
    }
}

impl Drop for BrowserLink {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.pump.abort();
        if let Some(handle) = &self.heartbeat {
            handle.abort();
        }

        let Ok(mut guard) = self.child.try_lock() else {
            return;
        };
        let Some(mut child) = guard.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", %err, "failed to kill chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to kill chromium"),
        }
    }
}
