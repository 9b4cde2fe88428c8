use action_log::SaveOutcome;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::json;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct RecordsArgs {
    #[command(subcommand)]
    pub command: RecordsCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum RecordsCommand {
    /// List saved records
    List,

    /// Save the current log under NAME
    Save {
        name: String,
        /// Overwrite an existing record without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace the current log with the record NAME
    Load { name: String },

    /// Delete the record NAME
    Delete { name: String },
}

#[derive(Debug, Serialize)]
struct RecordSummary {
    name: String,
    actions: usize,
    updated_at: Option<DateTime<Utc>>,
}

pub async fn cmd_records(args: RecordsArgs, ctx: &CliContext) -> Result<()> {
    let mut studio = ctx.studio().await?;
    let output = ctx.output();
    match args.command {
        RecordsCommand::List => {
            let summaries: Vec<RecordSummary> = studio
                .records()
                .records()
                .iter()
                .map(|record| RecordSummary {
                    name: record.name.clone(),
                    actions: record.actions.len(),
                    updated_at: record.updated_at,
                })
                .collect();
            output.emit(&summaries, |items| {
                if items.is_empty() {
                    println!("No saved records");
                }
                for item in items {
                    let updated = item
                        .updated_at
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<24} {:>4} actions  {}", item.name, item.actions, updated);
                }
            })?;
        }
        RecordsCommand::Save { name, yes } => {
            let saved = studio.save_record(&name, yes).await;
            let outcome = match saved {
                Ok(outcome) => outcome,
                Err(err) => {
                    studio.close().await?;
                    if err.needs_confirmation() {
                        bail!("{err} (rerun with --yes)");
                    }
                    return Err(err.into());
                }
            };
            let verb = match outcome {
                SaveOutcome::Created => "created",
                SaveOutcome::Overwritten => "overwritten",
            };
            output.emit(&json!({ "name": name.trim(), "outcome": verb }), |_| {
                println!("Record '{}' {verb}", name.trim())
            })?;
        }
        RecordsCommand::Load { name } => {
            let count = studio.load_record(&name)?;
            output.emit(&json!({ "name": name.trim(), "actions": count }), |_| {
                println!("Loaded '{}' ({count} actions)", name.trim())
            })?;
        }
        RecordsCommand::Delete { name } => {
            let removed = studio.delete_record(&name).await?;
            output.emit(&json!({ "deleted": removed.name }), |_| {
                println!("Deleted record '{}'", removed.name)
            })?;
        }
    }
    studio.close().await?;
    Ok(())
}
