use std::path::PathBuf;

use action_locator::PageDom;
use action_recorder::{CaptureOutcome, ScriptedEvent};
use anyhow::{Context, Result};
use clap::Args;
use recorder_core_types::ControlMessage;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct CaptureArgs {
    /// HTML snapshot the events are addressed against
    #[arg(long, value_name = "FILE")]
    pub html: PathBuf,

    /// JSON array of control messages and page events
    #[arg(long, value_name = "FILE")]
    pub script: PathBuf,

    /// Start in the recording state instead of idle
    #[arg(long)]
    pub recording: bool,
}

/// One entry of a capture script: a control message (`"type": ...`) or a page event
/// (`"event": ...`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureStep {
    Control(ControlMessage),
    Event(ScriptedEvent),
}

#[derive(Debug, Default, Serialize)]
struct CaptureSummary {
    steps: usize,
    recorded: usize,
    ignored: usize,
    alerts: Vec<String>,
    state: String,
    log_len: usize,
}

pub async fn cmd_capture(args: CaptureArgs, ctx: &CliContext) -> Result<()> {
    let html = fs::read_to_string(&args.html)
        .await
        .with_context(|| format!("failed to read {}", args.html.display()))?;
    let dom = PageDom::parse(&html).context("failed to parse HTML snapshot")?;
    let raw = fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("failed to read {}", args.script.display()))?;
    let steps: Vec<CaptureStep> =
        serde_json::from_str(&raw).context("capture script must be a JSON array of steps")?;

    let mut studio = ctx.studio().await?;
    if args.recording {
        studio.dispatch(ControlMessage::SetRecording { is_recording: true })?;
    }

    let mut summary = CaptureSummary {
        steps: steps.len(),
        ..CaptureSummary::default()
    };
    for (index, step) in steps.into_iter().enumerate() {
        match step {
            CaptureStep::Control(message) => studio.dispatch(message)?,
            CaptureStep::Event(event) => {
                let page_event = event
                    .resolve(&dom)
                    .with_context(|| format!("script step {}", index + 1))?;
                match studio.observe(&dom, &page_event)? {
                    CaptureOutcome::Recorded(action) => {
                        debug!(step = index + 1, kind = %action.kind, "recorded");
                        summary.recorded += 1;
                    }
                    CaptureOutcome::Blocked { alert } => summary.alerts.push(alert),
                    CaptureOutcome::Highlight(_) => {}
                    CaptureOutcome::Ignored => summary.ignored += 1,
                }
            }
        }
    }
    summary.state = studio.state().label();
    summary.log_len = studio.log().len();
    studio.close().await?;

    ctx.output().emit(&summary, |s| {
        println!(
            "Processed {} steps: {} recorded, {} ignored",
            s.steps, s.recorded, s.ignored
        );
        for alert in &s.alerts {
            println!("alert: {alert}");
        }
        println!("Recorder state: {}", s.state);
        println!("Action log now holds {} actions", s.log_len);
    })
}
