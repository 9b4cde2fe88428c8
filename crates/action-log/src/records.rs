//! Named snapshots of the action log.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use recorder_core_types::Action;

use crate::errors::RecordError;
use crate::store::KeyValueStore;

/// Store key holding the saved records.
pub const RECORDS_KEY: &str = "recorderStudio.savedRecords";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRecord {
    pub name: String,
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Refuse to replace an existing record.
    Ask,
    /// The user confirmed replacing it.
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Overwritten,
}

/// Saved records, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBook {
    records: Vec<NamedRecord>,
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

impl RecordBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored value, dropping entries without a name or an action list.
    pub fn from_value(value: Value) -> Self {
        let Value::Array(items) = value else {
            warn!(target: "action-log", "stored records are not an array");
            return Self::default();
        };
        let mut records: Vec<NamedRecord> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<NamedRecord>(item) {
                Ok(record) if !record.name.trim().is_empty() => Some(record),
                Ok(_) => {
                    warn!(target: "action-log", "dropping record with an empty name");
                    None
                }
                Err(err) => {
                    warn!(target: "action-log", %err, "dropping malformed record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| compare_names(&a.name, &b.name));
        Self { records }
    }

    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, RecordError> {
        Ok(store
            .get(RECORDS_KEY)
            .await?
            .map(Self::from_value)
            .unwrap_or_default())
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), RecordError> {
        store.set(RECORDS_KEY, self.to_value()).await?;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.records).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn records(&self) -> &[NamedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&NamedRecord> {
        let name = name.trim();
        self.records.iter().find(|r| r.name == name)
    }

    /// Save `actions` under `name`.
    pub fn upsert(
        &mut self,
        name: &str,
        actions: &[Action],
        policy: OverwritePolicy,
    ) -> Result<SaveOutcome, RecordError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecordError::EmptyName);
        }
        if actions.is_empty() {
            return Err(RecordError::EmptyLog);
        }

        let record = NamedRecord {
            name: name.to_string(),
            actions: actions.to_vec(),
            updated_at: Some(Utc::now()),
        };
        let outcome = match self.records.iter().position(|r| r.name == name) {
            Some(_) if policy == OverwritePolicy::Ask => {
                return Err(RecordError::ConfirmOverwrite {
                    name: name.to_string(),
                });
            }
            Some(index) => {
                self.records[index] = record;
                SaveOutcome::Overwritten
            }
            None => {
                self.records.push(record);
                SaveOutcome::Created
            }
        };
        self.records.sort_by(|a, b| compare_names(&a.name, &b.name));
        debug!(target: "action-log", name, ?outcome, "record saved");
        Ok(outcome)
    }

    pub fn remove(&mut self, name: &str) -> Result<NamedRecord, RecordError> {
        let name = name.trim();
        let index = self
            .records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RecordError::NotFound {
                name: name.to_string(),
            })?;
        Ok(self.records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn actions() -> Vec<Action> {
        vec![Action::click("//a", "Click on \"a\"")]
    }

    #[test]
    fn save_requires_name_and_actions() {
        let mut book = RecordBook::new();
        assert!(matches!(
            book.upsert("   ", &actions(), OverwritePolicy::Ask),
            Err(RecordError::EmptyName)
        ));
        assert!(matches!(
            book.upsert("smoke", &[], OverwritePolicy::Ask),
            Err(RecordError::EmptyLog)
        ));
    }

    #[test]
    fn overwrite_needs_confirmation() {
        let mut book = RecordBook::new();
        assert_eq!(
            book.upsert(" smoke ", &actions(), OverwritePolicy::Ask).unwrap(),
            SaveOutcome::Created
        );
        let err = book
            .upsert("smoke", &actions(), OverwritePolicy::Ask)
            .unwrap_err();
        assert!(err.needs_confirmation());
        assert_eq!(
            book.upsert("smoke", &actions(), OverwritePolicy::Confirmed)
                .unwrap(),
            SaveOutcome::Overwritten
        );
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn records_stay_sorted() {
        let mut book = RecordBook::new();
        for name in ["checkout", "Bravo", "alpha"] {
            book.upsert(name, &actions(), OverwritePolicy::Ask).unwrap();
        }
        assert_eq!(book.names(), vec!["alpha", "Bravo", "checkout"]);
        book.remove("Bravo").unwrap();
        assert_eq!(book.names(), vec!["alpha", "checkout"]);
        assert!(matches!(
            book.remove("missing"),
            Err(RecordError::NotFound { .. })
        ));
    }

    #[test]
    fn sanitizes_stored_records() {
        let book = RecordBook::from_value(json!([
            { "name": "zeta", "actions": [], "updatedAt": "2024-05-01T10:00:00Z" },
            { "name": "  ", "actions": [] },
            { "name": "no-actions" },
            { "actions": [] },
            { "name": "alpha", "actions": [
                { "type": "click", "selector": "//a", "description": "Click" }
            ] }
        ]));
        assert_eq!(book.names(), vec!["alpha", "zeta"]);
        assert_eq!(book.find("alpha").unwrap().actions.len(), 1);
    }
}
