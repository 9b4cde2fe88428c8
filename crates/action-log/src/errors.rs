use thiserror::Error;

use recorder_core_types::ActionError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("persistence worker stopped")]
    WorkerStopped,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("index {index} out of range for log of {len} actions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("comment text must not be empty")]
    EmptyComment,

    #[error("wait duration must be a positive number of seconds")]
    InvalidWait,

    #[error(transparent)]
    InvalidAction(#[from] ActionError),
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record name is required")]
    EmptyName,

    #[error("nothing to save: the action log is empty")]
    EmptyLog,

    #[error("record '{name}' already exists; confirm to overwrite it")]
    ConfirmOverwrite { name: String },

    #[error("record '{name}' not found")]
    NotFound { name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RecordError {
    /// The caller can retry with confirmation.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, RecordError::ConfirmOverwrite { .. })
    }
}
