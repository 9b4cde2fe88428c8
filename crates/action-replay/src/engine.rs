use std::sync::Arc;
use std::time::{Duration, Instant};

use cdp_adapter::{metrics, AdapterMetricsSnapshot, Debugger, SessionId, TargetInfo};
use recorder_core_types::{Action, ActionKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::{ReplayError, ResolveFailure};
use crate::scripts::{self, ScriptFailure, ScriptOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Pause after every click, type and select.
    #[serde(with = "millis", rename = "settle_ms")]
    pub settle: Duration,
    /// Upper bound on waiting for the first lifecycle event after attach.
    #[serde(with = "millis", rename = "lifecycle_wait_ms")]
    pub lifecycle_wait: Duration,
    /// Tab to replay on; the first page target when unset.
    pub target_id: Option<String>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            lifecycle_wait: Duration::from_millis(500),
            target_id: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub target_id: String,
    pub steps: usize,
    /// Clicks, types, selects and waits actually performed.
    pub executed: usize,
    /// Comments and assertions.
    pub skipped: usize,
    pub elapsed_ms: u64,
    pub cdp: AdapterMetricsSnapshot,
}

/// Drives one recorded log through a [`Debugger`], strictly in order.
pub struct ReplayEngine {
    debugger: Arc<dyn Debugger>,
    options: ReplayOptions,
}

#[derive(Default)]
struct Tally {
    executed: usize,
    skipped: usize,
}

impl ReplayEngine {
    pub fn new(debugger: Arc<dyn Debugger>, options: ReplayOptions) -> Self {
        Self { debugger, options }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Replay `actions`; the debugger session is released whatever the outcome.
    #[instrument(skip_all, fields(steps = actions.len(), tab = self.options.target_id.as_deref().unwrap_or("auto")))]
    pub async fn run(
        &self,
        actions: &[Action],
        cancel: &CancellationToken,
    ) -> Result<ReplayReport, ReplayError> {
        let started = Instant::now();
        let before = metrics::snapshot();

        let target = self.resolve_target().await?;
        let session = self
            .debugger
            .attach(&target.target_id)
            .await
            .map_err(ReplayError::SessionAttach)?;
        info!(target: "action-replay", target_id = %target.target_id, url = %target.url, "replay attached");

        let outcome = self.drive(&session, actions, cancel).await;

        if let Err(err) = self.debugger.detach(&session).await {
            warn!(target: "action-replay", session = %session, %err, "detach failed");
        }

        let tally = outcome?;
        let report = ReplayReport {
            target_id: target.target_id,
            steps: actions.len(),
            executed: tally.executed,
            skipped: tally.skipped,
            elapsed_ms: started.elapsed().as_millis().min(u64::MAX as u128) as u64,
            cdp: metrics::snapshot().since(&before),
        };
        debug!(target: "action-replay", cdp = ?report.cdp, "cdp usage");
        info!(
            target: "action-replay",
            executed = report.executed,
            skipped = report.skipped,
            elapsed_ms = report.elapsed_ms,
            "replay finished"
        );
        Ok(report)
    }

    async fn resolve_target(&self) -> Result<TargetInfo, ReplayError> {
        let targets = self
            .debugger
            .targets()
            .await
            .map_err(ReplayError::SessionAttach)?;
        let wanted = self.options.target_id.as_deref();
        targets
            .into_iter()
            .find(|t| match wanted {
                Some(id) => t.target_id == id,
                None => t.is_page(),
            })
            .ok_or_else(|| ReplayError::NoPageTarget {
                wanted: wanted.map(str::to_string),
            })
    }

    async fn drive(
        &self,
        session: &SessionId,
        actions: &[Action],
        cancel: &CancellationToken,
    ) -> Result<Tally, ReplayError> {
        for method in ["Page.enable", "Runtime.enable", "DOM.enable"] {
            self.debugger
                .send(session, method, json!({}))
                .await
                .map_err(|source| ReplayError::Setup {
                    method: method.to_string(),
                    source,
                })?;
        }
        self.settle_lifecycle(session).await;

        let mut tally = Tally::default();
        for (index, action) in actions.iter().enumerate() {
            let step = index + 1;
            if cancel.is_cancelled() {
                return Err(ReplayError::Cancelled { step });
            }
            debug!(target: "action-replay", step, total = actions.len(), kind = %action.kind, "step");

            match action.kind {
                ActionKind::Comment => {
                    tally.skipped += 1;
                    continue;
                }
                ActionKind::Wait => {
                    pause(Duration::from_millis(action.wait_millis()), cancel, step).await?;
                    tally.executed += 1;
                    continue;
                }
                kind if kind.is_assertion() => {
                    debug!(target: "action-replay", step, %kind, "assertion not replayed");
                    tally.skipped += 1;
                    continue;
                }
                ActionKind::Click => self.click(session, step, action).await?,
                _ => self.set_value(session, step, action).await?,
            }
            if action.kind.changes_page_state() {
                pause(self.options.settle, cancel, step).await?;
            }
            tally.executed += 1;
        }
        Ok(tally)
    }

    /// Best effort: a page that never reports a lifecycle event is still replayed.
    async fn settle_lifecycle(&self, session: &SessionId) {
        let settled = self
            .debugger
            .send_and_wait(
                session,
                "Page.setLifecycleEventsEnabled",
                json!({ "enabled": true }),
                "Page.lifecycleEvent",
                self.options.lifecycle_wait,
            )
            .await;
        match settled {
            Ok(Some(event)) => {
                debug!(target: "action-replay", name = ?event.get("name"), "page settled")
            }
            Ok(None) => debug!(target: "action-replay", "no lifecycle event before deadline"),
            Err(err) => debug!(target: "action-replay", %err, "lifecycle events unavailable"),
        }
    }

    async fn click(
        &self,
        session: &SessionId,
        step: usize,
        action: &Action,
    ) -> Result<(), ReplayError> {
        let locator = required_locator(step, action)?;
        let outcome = self
            .evaluate(session, step, action, &scripts::clickable_point(locator))
            .await?;
        let (x, y) = outcome.point().ok_or_else(|| ReplayError::ElementNotResolvable {
            step,
            kind: action.kind,
            reason: ResolveFailure::Malformed("missing click coordinates".into()),
        })?;
        debug!(target: "action-replay", step, x, y, tag = ?outcome.tag_name, "clicking");
        self.debugger
            .click_at(session, x, y)
            .await
            .map_err(|source| ReplayError::Command {
                step,
                kind: action.kind,
                source,
            })
    }

    async fn set_value(
        &self,
        session: &SessionId,
        step: usize,
        action: &Action,
    ) -> Result<(), ReplayError> {
        let locator = required_locator(step, action)?;
        let outcome = self
            .evaluate(
                session,
                step,
                action,
                &scripts::set_value(locator, action.value_or_empty()),
            )
            .await?;
        debug!(target: "action-replay", step, applied_as = ?outcome.kind, "value set");
        Ok(())
    }

    async fn evaluate(
        &self,
        session: &SessionId,
        step: usize,
        action: &Action,
        script: &str,
    ) -> Result<ScriptOutcome, ReplayError> {
        let value = self
            .debugger
            .evaluate(session, script)
            .await
            .map_err(|source| ReplayError::Command {
                step,
                kind: action.kind,
                source,
            })?;
        let outcome = ScriptOutcome::parse(value)
            .map_err(|failure| script_error(step, action.kind, failure))?;
        match outcome.failure() {
            Some(failure) => Err(script_error(step, action.kind, failure)),
            None => Ok(outcome),
        }
    }
}

fn required_locator(step: usize, action: &Action) -> Result<&str, ReplayError> {
    action
        .locator()
        .filter(|locator| !locator.trim().is_empty())
        .ok_or(ReplayError::ElementNotResolvable {
            step,
            kind: action.kind,
            reason: ResolveFailure::MissingLocator,
        })
}

fn script_error(step: usize, kind: ActionKind, failure: ScriptFailure) -> ReplayError {
    match failure {
        ScriptFailure::Resolve(reason) => ReplayError::ElementNotResolvable { step, kind, reason },
        ScriptFailure::Unsupported { tag } => ReplayError::UnsupportedElementKind { step, kind, tag },
    }
}

async fn pause(
    duration: Duration,
    cancel: &CancellationToken,
    step: usize,
) -> Result<(), ReplayError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(ReplayError::Cancelled { step }),
    }
}
