use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputFormat::Human)
    }

    /// Structured rendering; `Human` callers print their own text and never get here.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(match self {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Human | OutputFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }

    /// Print `value` structured, or run `human` for the text form.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.is_human() {
            human(value);
        } else {
            println!("{}", self.render(value)?);
        }
        Ok(())
    }
}
