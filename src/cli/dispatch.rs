use super::capture::cmd_capture;
use super::env::CliArgs;
use super::generate::cmd_generate;
use super::locate::cmd_locate;
use super::log::cmd_log;
use super::records::cmd_records;
use super::replay::cmd_replay;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Locate(args) => cmd_locate(args, ctx).await,
        Commands::Capture(args) => cmd_capture(args, ctx).await,
        Commands::Log(args) => cmd_log(args, ctx).await,
        Commands::Records(args) => cmd_records(args, ctx).await,
        Commands::Generate(args) => cmd_generate(args, ctx).await,
        Commands::Replay(args) => cmd_replay(args, ctx).await,
    }
}
