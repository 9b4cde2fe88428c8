//! Error types for locator system

use thiserror::Error;

use crate::dom::NodeId;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The target is not an element (text, comment, document node)
    #[error("No locator for node {node}: {reason}")]
    NoLocator { node: NodeId, reason: String },

    /// Candidate did not resolve to exactly the target element
    #[error("Candidate '{locator}' matched {matches} elements")]
    AmbiguousCandidate { locator: String, matches: usize },

    /// Candidate could not be parsed or evaluated
    #[error("Invalid XPath: {0}")]
    XPath(#[from] XPathError),

    /// The HTML snapshot could not be read
    #[error("Document parse failed: {0}")]
    Parse(String),
}

impl LocatorError {
    /// Errors the synthesizer swallows and falls through on.
    pub fn is_fallthrough(&self) -> bool {
        matches!(
            self,
            LocatorError::AmbiguousCandidate { .. } | LocatorError::XPath(_)
        )
    }

    /// Errors that must be surfaced to the user (blocking alert during capture).
    pub fn is_user_visible(&self) -> bool {
        matches!(self, LocatorError::NoLocator { .. })
    }
}

/// XPath subset parse errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XPathError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("unterminated string literal at offset {0}")]
    UnterminatedLiteral(usize),

    #[error("unsupported function '{0}()'")]
    UnsupportedFunction(String),
}
