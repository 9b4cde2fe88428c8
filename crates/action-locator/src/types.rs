//! Core types for locator synthesis

use serde::{Deserialize, Serialize};

/// Locator tier, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// `//body`
    Body,
    /// `id` attribute, trusted without an ambiguity check
    Identifier,
    /// `data-testid`
    TestAttribute,
    /// `name` on input/select/textarea
    FormName,
    Placeholder,
    AriaLabel,
    /// Immediate text of buttons, links, headings and text containers
    DirectText,
    /// Unique child locator followed by `/..`
    ChildDelegation,
    /// Parent locator plus same-tag sibling index
    AncestorPath,
    /// Fully indexed path from `body` or the document root
    AbsoluteFallback,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Body => "body",
            Tier::Identifier => "identifier",
            Tier::TestAttribute => "test_attribute",
            Tier::FormName => "form_name",
            Tier::Placeholder => "placeholder",
            Tier::AriaLabel => "aria_label",
            Tier::DirectText => "direct_text",
            Tier::ChildDelegation => "child_delegation",
            Tier::AncestorPath => "ancestor_path",
            Tier::AbsoluteFallback => "absolute_fallback",
        }
    }

    /// Attribute and text tiers probed on every element, in priority order.
    pub fn attribute_chain() -> [Tier; 7] {
        [
            Tier::Body,
            Tier::Identifier,
            Tier::TestAttribute,
            Tier::FormName,
            Tier::Placeholder,
            Tier::AriaLabel,
            Tier::DirectText,
        ]
    }

    /// Whether a candidate from this tier is accepted without evaluating it.
    pub fn is_trusted(&self) -> bool {
        matches!(
            self,
            Tier::Body | Tier::Identifier | Tier::AncestorPath | Tier::AbsoluteFallback
        )
    }
}

/// Traversal mode of one synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Top-level call: every tier, including child delegation.
    Root,
    /// Probing a child on behalf of its parent: attribute and text tiers only.
    DelegateChild,
    /// Resolving an ancestor of the target; `depth` counts levels above it.
    AncestorWalk(usize),
}

impl SynthesisMode {
    pub fn allows_delegation(&self) -> bool {
        matches!(self, SynthesisMode::Root)
    }

    pub fn allows_ancestor_walk(&self) -> bool {
        !matches!(self, SynthesisMode::DelegateChild)
    }
}

/// Locator plus the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesized {
    pub locator: String,
    pub tier: Tier,
}

impl Synthesized {
    pub fn new(locator: impl Into<String>, tier: Tier) -> Self {
        Self {
            locator: locator.into(),
            tier,
        }
    }
}
