use std::path::PathBuf;

use action_codegen::Dialect;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tokio::fs;
use tracing::info;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    /// fluent (Playwright) or selector (Puppeteer); defaults to the configured dialect
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// Name of the page variable in the generated code
    #[arg(long)]
    pub page: Option<String>,

    /// Write the code to FILE instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub async fn cmd_generate(args: GenerateArgs, ctx: &CliContext) -> Result<()> {
    let defaults = &ctx.config().codegen;
    let dialect = args.dialect.unwrap_or(defaults.dialect);
    let page = args.page.unwrap_or_else(|| defaults.page_variable.clone());

    let studio = ctx.studio().await?;
    let code = studio.generate(dialect, &page)?;
    let steps = studio.log().len();
    studio.close().await?;

    match &args.out {
        Some(path) => {
            fs::write(path, &code)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), %dialect, steps, "code written");
            ctx.output().emit(
                &json!({ "dialect": dialect, "steps": steps, "path": path }),
                |_| println!("Wrote {steps} steps of {dialect} code to {}", path.display()),
            )
        }
        None if ctx.output().is_human() => {
            print!("{code}");
            Ok(())
        }
        None => ctx.output().emit(
            &json!({ "dialect": dialect, "steps": steps, "code": code }),
            |_| {},
        ),
    }
}
