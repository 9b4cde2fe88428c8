use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const PAGE: &str = r#"<html><body>
  <h1>Sign in</h1>
  <form>
    <input name="user" placeholder="User name">
    <button id="save-btn">Save</button>
  </form>
</body></html>"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("page.html"), PAGE).expect("write page");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn studio(&self) -> Command {
        let bin = assert_cmd::cargo::cargo_bin!("recorder-studio");
        let mut cmd = Command::new(bin);
        cmd.current_dir(self.path())
            .env_remove("RECORDER_STUDIO_WS_URL")
            .env_remove("RUST_LOG")
            .env("RECORDER_STUDIO_STORAGE_DIR", self.path().join("store"))
            .args(["--config", "absent.yaml"]);
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let assert = self.studio().args(["-o", "json"]).args(args).assert().success();
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
        serde_json::from_str(&stdout).expect("valid json")
    }

    fn capture(&self, script: &str) {
        fs::write(self.path().join("script.json"), script).expect("write script");
        self.studio()
            .args(["capture", "--html", "page.html", "--script", "script.json"])
            .assert()
            .success();
    }
}

#[test]
fn locate_prefers_the_id() {
    let ws = Workspace::new();
    let value = ws.json(&["locate", "page.html", "--target", "//button"]);
    assert_eq!(value["locator"].as_str(), Some(r#"//*[@id="save-btn"]"#));
    assert_eq!(value["tier"].as_str(), Some("identifier"));
    assert_eq!(value["tag"].as_str(), Some("button"));
}

#[test]
fn locate_all_covers_body_elements() {
    let ws = Workspace::new();
    let value = ws.json(&["locate", "page.html", "--all"]);
    let items = value.as_array().expect("array");
    assert_eq!(items[0]["locator"].as_str(), Some("//body"));
    assert!(items.iter().any(|item| item["tag"] == "input"));
}

#[test]
fn captured_events_persist_into_the_log() {
    let ws = Workspace::new();
    ws.capture(
        r#"[
          { "event": "click", "target": "//button" },
          { "type": "set_recording", "isRecording": true },
          { "event": "change", "target": "//input", "value": "bob" },
          { "event": "click", "target": "//button" }
        ]"#,
    );

    let log = ws.json(&["log", "show"]);
    let actions = log["actions"].as_array().expect("actions");
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["kind"], "type");
    assert_eq!(actions[0]["value"], "bob");
    assert_eq!(actions[1]["kind"], "click");
    assert_eq!(actions[1]["description"], r#"Click on "Save""#);
    assert_eq!(log["dirty"], true);
}

#[test]
fn log_edits_and_records_round_trip() {
    let ws = Workspace::new();
    ws.studio().args(["log", "comment", "open login"]).assert().success();
    ws.studio().args(["log", "wait", "2"]).assert().success();
    ws.studio()
        .args(["log", "wait", "-1"])
        .assert()
        .failure();
    ws.studio().args(["log", "move", "2", "1"]).assert().success();

    let log = ws.json(&["log", "show"]);
    assert_eq!(log["actions"][0]["description"], "2 seconds");
    assert_eq!(log["actions"][1]["description"], "open login");

    ws.studio().args(["records", "save", "login"]).assert().success();
    ws.studio().args(["log", "delete", "1"]).assert().success();
    ws.studio().args(["records", "save", "other"]).assert().success();
    ws.studio().args(["records", "load", "login"]).assert().success();
    ws.studio().args(["log", "clear"]).assert().success();
    ws.studio().args(["log", "comment", "again"]).assert().success();
    ws.studio()
        .args(["records", "save", "other"])
        .assert()
        .failure();
    ws.studio()
        .args(["records", "save", "other", "--yes"])
        .assert()
        .success();

    let records = ws.json(&["records", "list"]);
    let names: Vec<&str> = records
        .as_array()
        .expect("records")
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, vec!["login", "other"]);
    assert_eq!(records[0]["actions"], 2);
    assert_eq!(records[1]["actions"], 1);

    ws.studio().args(["records", "delete", "login"]).assert().success();
    ws.studio()
        .args(["records", "load", "login"])
        .assert()
        .failure();
}

#[test]
fn generate_renders_the_log() {
    let ws = Workspace::new();
    ws.capture(
        r#"[
          { "type": "set_recording", "isRecording": true },
          { "event": "click", "target": "//button" }
        ]"#,
    );

    let assert = ws.studio().args(["generate"]).assert().success();
    let code = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    assert!(code.starts_with("// Click on \"Save\"\n"));
    assert!(code.contains(r#"await page.locator('xpath=//*[@id="save-btn"]').click();"#));

    ws.studio()
        .args(["generate", "--dialect", "selector", "--page", "tab", "--out", "test.js"])
        .assert()
        .success();
    let written = fs::read_to_string(ws.path().join("test.js")).expect("generated file");
    assert!(written.contains("xpath/"));
    assert!(written.contains("tab."));

    ws.studio()
        .args(["generate", "--page", "not valid"])
        .assert()
        .failure();
}

#[test]
fn replay_refuses_an_empty_log() {
    let ws = Workspace::new();
    let assert = ws.studio().args(["replay"]).assert().failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 output");
    assert!(stderr.contains("nothing to replay"));
}
