//! Chrome DevTools Protocol plumbing used by replay.
//!
//! The crate owns the websocket transport to Chromium (launched locally or discovered through a
//! remote-debugging endpoint), the per-tab session bookkeeping, and the [`Debugger`] surface the
//! replay engine drives: list targets, attach, send commands, wait for events, detach.

use std::{env, path::PathBuf};

use which::which;

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("cdp command timed out")]
        Timeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target not found")]
        TargetNotFound,
        #[error("page script raised an exception")]
        ScriptException,
        #[error("internal error")]
        Internal,
    }

    /// Error plus the context callers need to report or retry it.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{
        env,
        path::{Path, PathBuf},
    };

    pub const CHROME_ENV: &str = "RECORDER_STUDIO_CHROME";
    pub const HEADLESS_ENV: &str = "RECORDER_STUDIO_HEADLESS";
    pub const WS_URL_ENV: &str = "RECORDER_STUDIO_WS_URL";

    /// How to reach (or start) the browser that replays run against.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        pub default_deadline_ms: u64,
        /// Browser-level websocket, e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`.
        pub websocket_url: Option<String>,
        /// `host:port` of a Chrome started with `--remote-debugging-port`.
        pub remote_debugging_addr: Option<String>,
        /// Zero disables the keep-alive probe.
        pub heartbeat_interval_ms: u64,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: Path::new("./.recorder-studio-profile").into(),
                headless: true,
                default_deadline_ms: 30_000,
                websocket_url: None,
                remote_debugging_addr: None,
                heartbeat_interval_ms: 15_000,
            }
        }
    }

    impl CdpConfig {
        /// Apply `RECORDER_STUDIO_*` overrides on top of file or default values.
        pub fn apply_env_overrides(&mut self) {
            if let Some(path) = non_empty_env(CHROME_ENV) {
                self.executable = PathBuf::from(path);
            }
            if let Some(value) = non_empty_env(HEADLESS_ENV) {
                self.headless = !matches!(
                    value.to_ascii_lowercase().as_str(),
                    "0" | "false" | "no" | "off"
                );
            }
            if let Some(url) = non_empty_env(WS_URL_ENV) {
                self.websocket_url = Some(url);
            }
        }

        pub fn connects_to_existing(&self) -> bool {
            self.websocket_url.is_some() || self.remote_debugging_addr.is_some()
        }
    }

    fn non_empty_env(key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

pub(crate) fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var(config::CHROME_ENV) {
        let candidate = PathBuf::from(raw.trim());
        if !raw.trim().is_empty() && candidate.exists() {
            return Some(candidate);
        }
    }

    if let Some(path) = chrome_executable_names()
        .iter()
        .find_map(|name| which(name).ok())
    {
        return Some(path);
    }

    let skip_defaults = env::var("RECORDER_STUDIO_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if skip_defaults {
        return None;
    }
    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .map(PathBuf::from)
            .map(|root| root.join("Google/Chrome/Application/chrome.exe"))
            .collect()
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}

pub mod metrics;
pub mod registry;
pub mod session;
pub mod transport;
pub mod util;

pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use metrics::AdapterMetricsSnapshot;
pub use registry::SessionRegistry;
pub use session::{CdpDebugger, Debugger, SessionId, TargetInfo};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, NoopTransport, TransportEvent};

#[cfg(test)]
mod tests {
    use super::config::{CdpConfig, CHROME_ENV, HEADLESS_ENV, WS_URL_ENV};
    use super::{chrome_executable_names, detect_chrome_executable};
    use serial_test::serial;
    use std::{env, fs};
    use tempfile::tempdir;

    fn restore(key: &str, value: Option<String>) {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    #[test]
    #[serial]
    fn detects_from_env_var() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var(CHROME_ENV).ok();
        env::set_var(CHROME_ENV, exe_path.to_string_lossy().to_string());
        let detected = detect_chrome_executable();
        restore(CHROME_ENV, original);
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    #[serial]
    fn detects_from_path_entries() {
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join(chrome_executable_names()[0]);
        fs::write(&exe_path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&exe_path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let original_path = env::var("PATH").ok();
        let original_env = env::var(CHROME_ENV).ok();
        let skip_flag = env::var("RECORDER_STUDIO_SKIP_OS_PATHS").ok();
        env::set_var(CHROME_ENV, "");
        env::set_var("RECORDER_STUDIO_SKIP_OS_PATHS", "1");
        env::set_var("PATH", dir.path());
        let detected = detect_chrome_executable();
        restore("PATH", original_path);
        restore(CHROME_ENV, original_env);
        restore("RECORDER_STUDIO_SKIP_OS_PATHS", skip_flag);
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_on_top_of_config() {
        let saved: Vec<_> = [HEADLESS_ENV, WS_URL_ENV]
            .iter()
            .map(|key| (*key, env::var(key).ok()))
            .collect();
        env::set_var(HEADLESS_ENV, "off");
        env::set_var(WS_URL_ENV, "ws://127.0.0.1:9222/devtools/browser/abc");

        let mut cfg = CdpConfig::default();
        cfg.apply_env_overrides();

        for (key, value) in saved {
            restore(key, value);
        }
        assert!(!cfg.headless);
        assert_eq!(
            cfg.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
        assert!(cfg.connects_to_existing());
    }
}
