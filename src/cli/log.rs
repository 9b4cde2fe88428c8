use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use recorder_core_types::Action;
use serde::Serialize;

use crate::cli::context::CliContext;
use crate::coordinator::StudioCoordinator;

#[derive(Args, Clone, Debug)]
pub struct LogArgs {
    #[command(subcommand)]
    pub command: LogCommand,
}

/// Positions are 1-based, as shown by `log show`.
#[derive(Subcommand, Clone, Debug)]
pub enum LogCommand {
    /// Print the action log
    Show,

    /// Remove the action at POSITION
    Delete { position: usize },

    /// Move the action at FROM so it ends up at TO
    Move { from: usize, to: usize },

    /// Insert a comment (appended unless --at is given)
    Comment {
        text: String,
        #[arg(long)]
        at: Option<usize>,
    },

    /// Insert a wait of SECONDS (appended unless --at is given)
    Wait {
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
        #[arg(long)]
        at: Option<usize>,
    },

    /// Empty the log and stop recording
    Clear,
}

#[derive(Debug, Serialize)]
struct LogView<'a> {
    origin: Option<&'a str>,
    dirty: bool,
    actions: &'a [Action],
}

fn to_index(position: usize) -> Result<usize> {
    match position.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("positions start at 1"),
    }
}

fn to_insert_index(at: Option<usize>) -> Result<Option<usize>> {
    at.map(to_index).transpose()
}

pub async fn cmd_log(args: LogArgs, ctx: &CliContext) -> Result<()> {
    let mut studio = ctx.studio().await?;
    let message = match args.command {
        LogCommand::Show => None,
        LogCommand::Delete { position } => {
            let removed = studio.delete_action(to_index(position)?)?;
            Some(format!("Deleted {position}: {}", removed.description))
        }
        LogCommand::Move { from, to } => {
            studio.move_action(to_index(from)?, to_index(to)?)?;
            Some(format!("Moved {from} to {to}"))
        }
        LogCommand::Comment { text, at } => {
            let index = studio.insert_comment(to_insert_index(at)?, &text)?;
            Some(format!("Comment inserted at {}", index + 1))
        }
        LogCommand::Wait { seconds, at } => {
            let index = studio.insert_wait(to_insert_index(at)?, seconds)?;
            Some(format!("Wait inserted at {}", index + 1))
        }
        LogCommand::Clear => {
            studio.clear();
            Some("Action log cleared".to_string())
        }
    };

    if let Some(message) = &message {
        if ctx.output().is_human() {
            println!("{message}");
        }
    }
    let result = print_log(&studio, ctx, message.is_none());
    studio.close().await?;
    result
}

fn print_log(studio: &StudioCoordinator, ctx: &CliContext, show: bool) -> Result<()> {
    let log = studio.log();
    let view = LogView {
        origin: log.origin(),
        dirty: log.is_dirty(),
        actions: log.actions(),
    };
    if ctx.output().is_human() && !show {
        return Ok(());
    }
    ctx.output().emit(&view, |view| {
        match view.origin {
            Some(name) if view.dirty => println!("Record: {name} (modified)"),
            Some(name) => println!("Record: {name}"),
            None => println!("Record: (unsaved)"),
        }
        if view.actions.is_empty() {
            println!("No actions recorded");
        }
        for (index, action) in view.actions.iter().enumerate() {
            match action.locator() {
                Some(locator) => println!(
                    "{:>3}. [{}] {}  {}",
                    index + 1,
                    action.kind,
                    action.description,
                    locator
                ),
                None => println!("{:>3}. [{}] {}", index + 1, action.kind, action.description),
            }
        }
    })
}
