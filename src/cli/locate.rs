use std::path::PathBuf;

use action_locator::{synthesize, xpath, PageDom, Synthesized};
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct LocateArgs {
    /// HTML snapshot of the page
    pub html: PathBuf,

    /// XPath picking the element to locate (first match)
    #[arg(short, long, conflicts_with = "all")]
    pub target: Option<String>,

    /// Locate every element under <body>
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct LocatedElement {
    tag: String,
    #[serde(flatten)]
    synthesized: Synthesized,
}

pub async fn cmd_locate(args: LocateArgs, ctx: &CliContext) -> Result<()> {
    let html = fs::read_to_string(&args.html)
        .await
        .with_context(|| format!("failed to read {}", args.html.display()))?;
    let dom = PageDom::parse(&html).context("failed to parse HTML snapshot")?;

    let nodes = match (&args.target, args.all) {
        (Some(target), _) => {
            let matches = xpath::select(&dom, target)
                .with_context(|| format!("invalid target expression '{target}'"))?;
            match matches.first() {
                Some(node) => vec![*node],
                None => bail!("no element matches '{target}'"),
            }
        }
        (None, true) => match dom.body() {
            Some(body) => dom
                .subtree(body)
                .into_iter()
                .filter(|id| dom.is_element(*id))
                .collect(),
            None => Vec::new(),
        },
        (None, false) => bail!("pass --target <XPATH> or --all"),
    };

    let mut located = Vec::with_capacity(nodes.len());
    for node in nodes {
        let synthesized = synthesize(&dom, node)?;
        located.push(LocatedElement {
            tag: dom.tag(node).unwrap_or_default().to_string(),
            synthesized,
        });
    }

    match (&args.target, located.as_slice()) {
        (Some(_), [single]) => ctx.output().emit(single, |el| {
            println!("{}", el.synthesized.locator);
            println!("  tier: {}", el.synthesized.tier.name());
        }),
        _ => ctx.output().emit(&located, |items| {
            for el in items {
                println!(
                    "{:<10} {:<18} {}",
                    el.tag,
                    el.synthesized.tier.name(),
                    el.synthesized.locator
                );
            }
        }),
    }
}
