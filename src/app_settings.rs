use std::path::PathBuf;

use action_codegen::Dialect;
use action_replay::ReplayOptions;
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};

/// Application settings, read from `config.yaml`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory of the JSON key-value store (action log, session, saved records).
    pub storage_dir: PathBuf,
    pub codegen: CodegenConfig,
    pub replay: ReplayOptions,
    pub cdp: CdpConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CodegenConfig {
    pub dialect: Dialect,
    pub page_variable: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Fluent,
            page_variable: "page".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./recorder-data"),
            codegen: CodegenConfig::default(),
            replay: ReplayOptions::default(),
            cdp: CdpConfig::default(),
        }
    }
}
