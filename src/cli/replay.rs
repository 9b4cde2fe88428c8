use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_replay::{CancellationToken, ReplayEngine, ReplayReport};
use anyhow::{bail, Context, Result};
use cdp_adapter::{CdpDebugger, CdpTransport, ChromiumTransport};
use clap::Args;
use tokio::fs;
use tracing::{info, warn};

use crate::cli::context::CliContext;
use crate::metrics;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Target id of the tab to drive; the first page target when omitted
    #[arg(long)]
    pub target: Option<String>,

    /// Pause after each click, type and select, in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Browser websocket endpoint of an already running Chrome
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Write CDP metrics in Prometheus text format to FILE after the run
    #[arg(long, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    let mut studio = ctx.studio().await?;
    if studio.log().is_empty() {
        studio.close().await?;
        bail!("the action log is empty; nothing to replay");
    }

    let mut options = ctx.config().replay.clone();
    if let Some(target) = args.target {
        options.target_id = Some(target);
    }
    if let Some(ms) = args.settle_ms {
        options.settle = Duration::from_millis(ms);
    }
    let mut cdp = ctx.config().cdp.clone();
    if let Some(url) = args.ws_url {
        cdp.websocket_url = Some(url);
    }

    metrics::register_metrics();
    let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cdp));
    let debugger = Arc::new(CdpDebugger::new(transport));
    if let Err(err) = debugger.start().await {
        studio.close().await?;
        return Err(err).context("failed to connect to Chrome");
    }
    let engine = ReplayEngine::new(debugger.clone(), options);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling replay");
                cancel.cancel();
            }
        })
    };

    info!(steps = studio.log().len(), "replay starting");
    let outcome = studio.replay(&engine, &cancel).await;
    interrupt.abort();
    debugger.shutdown().await;
    studio.close().await?;

    if let Some(path) = &args.metrics_out {
        fs::write(path, metrics::render_text()?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let report = outcome?;
    ctx.output().emit(&report, print_report)
}

fn print_report(report: &ReplayReport) {
    println!(
        "Replayed {} steps on {} in {} ms ({} executed, {} skipped)",
        report.steps, report.target_id, report.elapsed_ms, report.executed, report.skipped
    );
    println!(
        "CDP: {} commands, {} failed, {} events",
        report.cdp.commands, report.cdp.command_failures, report.cdp.events
    );
}
