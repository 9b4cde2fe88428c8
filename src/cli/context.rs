use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_log::JsonFileStore;
use anyhow::{Context, Result};

use super::output::OutputFormat;
use crate::app_settings::Config;
use crate::coordinator::StudioCoordinator;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    /// Open the studio over the configured storage directory.
    pub async fn studio(&self) -> Result<StudioCoordinator> {
        let store = JsonFileStore::new(self.config.storage_dir.clone());
        StudioCoordinator::open(Arc::new(store))
            .await
            .with_context(|| {
                format!(
                    "failed to open studio storage at {}",
                    self.config.storage_dir.display()
                )
            })
    }
}
