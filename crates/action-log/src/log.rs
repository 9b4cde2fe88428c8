//! The ordered action log.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use recorder_core_types::Action;

use crate::errors::{LogError, StoreError};
use crate::store::KeyValueStore;

/// Store key holding the current action list.
pub const ACTIONS_KEY: &str = "recordedActions";
/// Store key holding [`LogMeta`].
pub const SESSION_KEY: &str = "recorderStudio.session";

/// Which record the log was loaded from and whether it changed since.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub dirty: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionLog {
    actions: Vec<Action>,
    meta: LogMeta,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actions(actions: Vec<Action>) -> Self {
        Self {
            actions,
            meta: LogMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: LogMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Read the persisted log, dropping entries that no longer parse.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let actions = match store.get(ACTIONS_KEY).await? {
            Some(value) => parse_actions(value),
            None => Vec::new(),
        };
        let meta = match store.get(SESSION_KEY).await? {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(target: "action-log", %err, "discarding malformed session metadata");
                LogMeta::default()
            }),
            None => LogMeta::default(),
        };
        Ok(Self { actions, meta })
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn meta(&self) -> &LogMeta {
        &self.meta
    }

    pub fn origin(&self) -> Option<&str> {
        self.meta.origin.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.meta.dirty
    }

    fn touch(&mut self) {
        self.meta.dirty = true;
    }

    /// Append a captured action; returns its index.
    pub fn append(&mut self, action: Action) -> Result<usize, LogError> {
        action.validate()?;
        self.actions.push(action);
        self.touch();
        Ok(self.actions.len() - 1)
    }

    pub fn delete(&mut self, index: usize) -> Result<Action, LogError> {
        self.check_index(index)?;
        let removed = self.actions.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Remove the action at `from` and re-insert it at `to`.
    pub fn move_action(&mut self, from: usize, to: usize) -> Result<(), LogError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }
        let action = self.actions.remove(from);
        self.actions.insert(to, action);
        self.touch();
        Ok(())
    }

    /// Insert a comment at `at` (appended when `None`); returns its index.
    pub fn insert_comment(&mut self, at: Option<usize>, text: &str) -> Result<usize, LogError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LogError::EmptyComment);
        }
        self.insert_at(at, Action::comment(text))
    }

    /// Insert a wait of `seconds` at `at` (appended when `None`); returns its index.
    pub fn insert_wait(&mut self, at: Option<usize>, seconds: i64) -> Result<usize, LogError> {
        let seconds = u64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .ok_or(LogError::InvalidWait)?;
        self.insert_at(at, Action::wait(seconds))
    }

    fn insert_at(&mut self, at: Option<usize>, action: Action) -> Result<usize, LogError> {
        let index = at.unwrap_or(self.actions.len());
        if index > self.actions.len() {
            return Err(LogError::IndexOutOfRange {
                index,
                len: self.actions.len(),
            });
        }
        self.actions.insert(index, action);
        self.touch();
        Ok(index)
    }

    /// Empty the log and forget which record it came from.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.meta = LogMeta::default();
    }

    /// Replace the whole list, e.g. after an external reorder.
    pub fn replace(&mut self, actions: Vec<Action>) {
        self.actions = actions;
        self.touch();
    }

    /// Replace the list with a saved record's actions and mark it clean.
    pub fn load_record(&mut self, name: &str, actions: Vec<Action>) {
        self.actions = actions;
        self.mark_saved(name);
    }

    pub fn mark_saved(&mut self, name: &str) {
        self.meta = LogMeta {
            origin: Some(name.to_string()),
            dirty: false,
        };
    }

    pub fn actions_value(&self) -> Value {
        serde_json::to_value(&self.actions).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn meta_value(&self) -> Value {
        serde_json::to_value(&self.meta).unwrap_or(Value::Null)
    }

    fn check_index(&self, index: usize) -> Result<(), LogError> {
        if index < self.actions.len() {
            Ok(())
        } else {
            Err(LogError::IndexOutOfRange {
                index,
                len: self.actions.len(),
            })
        }
    }
}

/// Parse a stored action array, skipping malformed entries.
pub fn parse_actions(value: Value) -> Vec<Action> {
    let Value::Array(items) = value else {
        warn!(target: "action-log", "stored action list is not an array");
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Action>(item) {
            Ok(action) => Some(action),
            Err(err) => {
                warn!(target: "action-log", index, %err, "skipping malformed stored action");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorder_core_types::ActionKind;

    fn sample() -> ActionLog {
        let mut log = ActionLog::new();
        log.append(Action::click("//a", "Click on \"a\"")).unwrap();
        log.append(Action::click("//b", "Click on \"b\"")).unwrap();
        log.append(Action::click("//c", "Click on \"c\"")).unwrap();
        log
    }

    fn locators(log: &ActionLog) -> Vec<&str> {
        log.actions().iter().filter_map(|a| a.locator()).collect()
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut log = sample();
        let removed = log.delete(1).unwrap();
        assert_eq!(removed.locator(), Some("//b"));
        assert_eq!(locators(&log), vec!["//a", "//c"]);
        assert_eq!(
            log.delete(5),
            Err(LogError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn move_is_remove_then_insert() {
        let mut log = sample();
        log.move_action(0, 2).unwrap();
        assert_eq!(locators(&log), vec!["//b", "//c", "//a"]);
        log.move_action(2, 0).unwrap();
        assert_eq!(locators(&log), vec!["//a", "//b", "//c"]);
        assert!(log.move_action(0, 3).is_err());
    }

    #[test]
    fn comments_and_waits() {
        let mut log = sample();
        assert_eq!(log.insert_comment(Some(1), "  checkpoint "), Ok(1));
        assert_eq!(log.get(1).unwrap().description, "checkpoint");
        assert_eq!(log.insert_comment(None, "   "), Err(LogError::EmptyComment));

        let index = log.insert_wait(None, 1).unwrap();
        assert_eq!(log.get(index).unwrap().kind, ActionKind::Wait);
        assert_eq!(log.get(index).unwrap().description, "1 second");
        assert_eq!(log.insert_wait(None, 0), Err(LogError::InvalidWait));
        assert_eq!(log.insert_wait(None, -3), Err(LogError::InvalidWait));
        assert!(log.insert_comment(Some(99), "x").is_err());
    }

    #[test]
    fn append_rejects_locatorless_clicks() {
        let mut log = ActionLog::new();
        let mut action = Action::click("//a", "Click");
        action.locator = None;
        assert!(matches!(log.append(action), Err(LogError::InvalidAction(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn dirty_tracking() {
        let mut log = sample();
        assert!(log.is_dirty());
        log.mark_saved("smoke");
        assert!(!log.is_dirty());
        assert_eq!(log.origin(), Some("smoke"));
        log.delete(0).unwrap();
        assert!(log.is_dirty());
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.origin(), None);
        assert!(!log.is_dirty());
    }

    #[test]
    fn malformed_stored_actions_are_skipped() {
        let value = serde_json::json!([
            { "type": "click", "selector": "//a", "description": "ok" },
            { "type": "teleport" },
            42
        ]);
        let actions = parse_actions(value);
        assert_eq!(actions.len(), 1);
        assert!(parse_actions(serde_json::json!({ "not": "a list" })).is_empty());
    }
}
