use thiserror::Error;

use action_locator::{LocatorError, NodeId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("event target {0} is not part of the page snapshot")]
    UnknownNode(NodeId),

    #[error("no element matches '{0}'")]
    TargetNotFound(String),

    #[error(transparent)]
    Locator(#[from] LocatorError),
}
