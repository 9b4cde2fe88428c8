//! Locator synthesis for recorded actions
//!
//! This crate turns a DOM element into an XPath locator that selects exactly that element:
//! - `dom`: in-memory page snapshot parsed with html5ever
//! - `xpath`: the XPath subset used by synthesized locators, for ambiguity checks
//! - `synth`: tiered synthesis (id, test attribute, form name, placeholder, aria label,
//!   direct text, child delegation, ancestor path, absolute fallback)

pub mod dom;
pub mod errors;
pub mod synth;
pub mod types;
pub mod xpath;

pub use dom::{normalize_space, DomNode, NodeId, NodeKind, PageDom};
pub use errors::*;
pub use synth::{synthesize, Synthesizer};
pub use types::*;
pub use xpath::XPath;
