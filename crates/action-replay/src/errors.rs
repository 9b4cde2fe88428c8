use std::fmt;

use cdp_adapter::AdapterError;
use recorder_core_types::ActionKind;
use thiserror::Error;

/// Why a step's element could not be acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    MissingLocator,
    NotFound,
    InvalidXPath(String),
    ZeroSize,
    NotInteractable,
    /// The page script returned something we could not read.
    Malformed(String),
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveFailure::MissingLocator => f.write_str("action has no locator"),
            ResolveFailure::NotFound => f.write_str("no element matches the locator"),
            ResolveFailure::InvalidXPath(detail) => write!(f, "invalid XPath: {detail}"),
            ResolveFailure::ZeroSize => f.write_str("element has zero size"),
            ResolveFailure::NotInteractable => f.write_str(
                "element is not interactable (hidden, display:none or pointer-events:none)",
            ),
            ResolveFailure::Malformed(detail) => write!(f, "unexpected script result: {detail}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("no page target to replay on{}", wanted.as_ref().map(|id| format!(" (wanted {id})")).unwrap_or_default())]
    NoPageTarget { wanted: Option<String> },

    #[error("failed to attach debugger: {0}")]
    SessionAttach(#[source] AdapterError),

    #[error("session setup failed at {method}: {source}")]
    Setup {
        method: String,
        #[source]
        source: AdapterError,
    },

    #[error("step {step} ({kind}) failed: {reason}")]
    ElementNotResolvable {
        step: usize,
        kind: ActionKind,
        reason: ResolveFailure,
    },

    #[error("step {step} ({kind}) failed: cannot type into <{tag}>")]
    UnsupportedElementKind {
        step: usize,
        kind: ActionKind,
        tag: String,
    },

    #[error("step {step} ({kind}) failed: {source}")]
    Command {
        step: usize,
        kind: ActionKind,
        #[source]
        source: AdapterError,
    },

    #[error("replay cancelled at step {step}")]
    Cancelled { step: usize },
}

impl ReplayError {
    /// 1-based index of the failing step, when the failure belongs to one.
    pub fn step(&self) -> Option<usize> {
        match self {
            ReplayError::ElementNotResolvable { step, .. }
            | ReplayError::UnsupportedElementKind { step, .. }
            | ReplayError::Command { step, .. }
            | ReplayError::Cancelled { step } => Some(*step),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ReplayError::ElementNotResolvable { kind, .. }
            | ReplayError::UnsupportedElementKind { kind, .. }
            | ReplayError::Command { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReplayError::Cancelled { .. })
    }
}
