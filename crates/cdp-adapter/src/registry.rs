//! Which tab each live debugger session is attached to.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachedTarget {
    pub target_id: String,
    pub session_id: SessionId,
    pub url: Option<String>,
}

/// At most one session per target id.
#[derive(Default)]
pub struct SessionRegistry {
    by_target: DashMap<String, AttachedTarget>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh attachment, returning the session it replaced.
    pub fn insert(
        &self,
        target_id: &str,
        session_id: SessionId,
        url: Option<String>,
    ) -> Option<SessionId> {
        self.by_target
            .insert(
                target_id.to_string(),
                AttachedTarget {
                    target_id: target_id.to_string(),
                    session_id,
                    url,
                },
            )
            .map(|previous| previous.session_id)
    }

    pub fn session_for(&self, target_id: &str) -> Option<SessionId> {
        self.by_target
            .get(target_id)
            .map(|entry| entry.session_id.clone())
    }

    /// Forget `session_id` wherever it is registered.
    pub fn remove_session(&self, session_id: &SessionId) -> Option<AttachedTarget> {
        let target = self
            .by_target
            .iter()
            .find(|entry| &entry.session_id == session_id)
            .map(|entry| entry.key().clone())?;
        self.by_target.remove(&target).map(|(_, attached)| attached)
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    pub fn attached(&self) -> Vec<AttachedTarget> {
        self.by_target
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
