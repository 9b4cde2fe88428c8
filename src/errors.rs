//! Error type of the studio coordinator.

use action_codegen::CodegenError;
use action_log::{LogError, RecordError, StoreError};
use action_recorder::CaptureError;
use action_replay::ReplayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioFailure {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),
}

impl StudioFailure {
    /// The caller may retry the save with overwrite confirmed.
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, StudioFailure::Record(err) if err.needs_confirmation())
    }

    /// Short text suitable for an alert.
    pub fn user_message(&self) -> String {
        match self {
            StudioFailure::Replay(err) => match (err.step(), err.kind()) {
                (Some(step), Some(kind)) => format!("Replay failed at step {step} ({kind})"),
                (Some(step), None) => format!("Replay stopped at step {step}"),
                _ => err.to_string(),
            },
            other => other.to_string(),
        }
    }
}
