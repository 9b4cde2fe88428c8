//! Multi-tier locator synthesis.
//!
//! Tiers are probed in [`Tier`] order and the first candidate that selects exactly the target
//! element wins. Identifier and body candidates are trusted without evaluation; child
//! delegation only runs for the top-level call, and the ancestor path recurses upward until
//! an ancestor yields its own locator (at the latest `//body`).

use tracing::{debug, trace};

use crate::dom::{normalize_space, NodeId, PageDom};
use crate::errors::LocatorError;
use crate::types::{Synthesized, SynthesisMode, Tier};
use crate::xpath::{self, literal};

const TEXT_TAGS: &[&str] = &[
    "button", "a", "div", "span", "h1", "h2", "h3", "h4", "h5", "p",
];
const FORM_TAGS: &[&str] = &["input", "select", "textarea"];
const MAX_ANCESTOR_DEPTH: usize = 256;

/// Convenience wrapper around [`Synthesizer::synthesize`].
pub fn synthesize(dom: &PageDom, node: NodeId) -> Result<Synthesized, LocatorError> {
    Synthesizer::new(dom).synthesize(node)
}

pub struct Synthesizer<'a> {
    dom: &'a PageDom,
}

impl<'a> Synthesizer<'a> {
    pub fn new(dom: &'a PageDom) -> Self {
        Self { dom }
    }

    /// Produce a locator that selects exactly `node`.
    pub fn synthesize(&self, node: NodeId) -> Result<Synthesized, LocatorError> {
        if !self.dom.is_element(node) {
            return Err(LocatorError::NoLocator {
                node,
                reason: "target is not an element".to_string(),
            });
        }
        let result = self
            .synthesize_in(node, SynthesisMode::Root)
            .unwrap_or_else(|| self.absolute(node));
        debug!(
            target: "action-locator",
            node,
            tier = result.tier.name(),
            locator = %result.locator,
            "locator synthesized"
        );
        Ok(result)
    }

    pub fn locator_for(&self, node: NodeId) -> Result<String, LocatorError> {
        self.synthesize(node).map(|found| found.locator)
    }

    /// Accept `candidate` only when it selects `node` and nothing else.
    pub fn check_unique(&self, candidate: &str, node: NodeId) -> Result<(), LocatorError> {
        let matches = xpath::select(self.dom, candidate)?;
        if matches.as_slice() == [node] {
            Ok(())
        } else {
            Err(LocatorError::AmbiguousCandidate {
                locator: candidate.to_string(),
                matches: matches.len(),
            })
        }
    }

    fn synthesize_in(&self, node: NodeId, mode: SynthesisMode) -> Option<Synthesized> {
        if let Some(found) = self.attribute_tiers(node) {
            return Some(found);
        }
        if mode.allows_delegation() {
            if let Some(found) = self.delegate(node) {
                return Some(found);
            }
        }
        if !mode.allows_ancestor_walk() {
            return None;
        }
        Some(self.ancestor_path(node, mode))
    }

    fn attribute_tiers(&self, node: NodeId) -> Option<Synthesized> {
        for tier in Tier::attribute_chain() {
            let Some(candidate) = self.propose(tier, node) else {
                continue;
            };
            if tier.is_trusted() {
                return Some(Synthesized::new(candidate, tier));
            }
            match self.check_unique(&candidate, node) {
                Ok(()) => return Some(Synthesized::new(candidate, tier)),
                Err(err) if err.is_fallthrough() => {
                    trace!(target: "action-locator", tier = tier.name(), %err, "candidate rejected")
                }
                Err(err) => {
                    debug!(target: "action-locator", tier = tier.name(), %err, "tier abandoned");
                    return None;
                }
            }
        }
        None
    }

    fn propose(&self, tier: Tier, node: NodeId) -> Option<String> {
        let tag = self.dom.tag(node)?;
        match tier {
            Tier::Body => (tag == "body").then(|| "//body".to_string()),
            Tier::Identifier => {
                let id = self.dom.attr(node, "id")?;
                if id.is_empty() || id.starts_with(':') || id.ends_with(':') {
                    return None;
                }
                Some(format!("//*[@id={}]", literal(id)))
            }
            Tier::TestAttribute => {
                let value = self.non_empty_attr(node, "data-testid")?;
                Some(format!("//*[@data-testid={}]", literal(value)))
            }
            Tier::FormName => {
                if !FORM_TAGS.contains(&tag) {
                    return None;
                }
                let name = self.non_empty_attr(node, "name")?;
                Some(format!(
                    "//*[local-name()={}][@name={}]",
                    literal(tag),
                    literal(name)
                ))
            }
            Tier::Placeholder => {
                if tag != "input" {
                    return None;
                }
                let placeholder = normalize_space(self.dom.attr(node, "placeholder")?);
                if placeholder.is_empty() {
                    return None;
                }
                Some(format!(
                    "//*[local-name()=\"input\"][normalize-space(@placeholder)={}]",
                    literal(&placeholder)
                ))
            }
            Tier::AriaLabel => {
                let label = normalize_space(self.dom.attr(node, "aria-label")?);
                if label.is_empty() {
                    return None;
                }
                Some(format!(
                    "//*[normalize-space(@aria-label)={}]",
                    literal(&label)
                ))
            }
            Tier::DirectText => {
                if !TEXT_TAGS.contains(&tag) {
                    return None;
                }
                let text = self.dom.direct_text(node);
                if text.is_empty() {
                    return None;
                }
                Some(format!(
                    "//*[local-name()={}][normalize-space(text())={}]",
                    literal(tag),
                    literal(&text)
                ))
            }
            Tier::ChildDelegation | Tier::AncestorPath | Tier::AbsoluteFallback => None,
        }
    }

    fn non_empty_attr(&self, node: NodeId, name: &str) -> Option<&'a str> {
        self.dom.attr(node, name).filter(|value| !value.is_empty())
    }

    fn delegate(&self, node: NodeId) -> Option<Synthesized> {
        for child in self.dom.element_children(node) {
            let Some(found) = self.synthesize_in(child, SynthesisMode::DelegateChild) else {
                continue;
            };
            let composed = format!("{}/..", found.locator);
            if self.check_unique(&composed, node).is_ok() {
                return Some(Synthesized::new(composed, Tier::ChildDelegation));
            }
        }
        None
    }

    fn ancestor_path(&self, node: NodeId, mode: SynthesisMode) -> Synthesized {
        let depth = match mode {
            SynthesisMode::AncestorWalk(depth) => depth,
            _ => 0,
        };
        let Some(parent) = self.dom.parent_element(node) else {
            return self.absolute(node);
        };
        if depth >= MAX_ANCESTOR_DEPTH {
            return self.absolute(node);
        }
        let parent_locator = self
            .synthesize_in(parent, SynthesisMode::AncestorWalk(depth + 1))
            .unwrap_or_else(|| self.absolute(parent));
        Synthesized::new(
            format!("{}{}", parent_locator.locator, self.segment(node, false)),
            Tier::AncestorPath,
        )
    }

    fn segment(&self, node: NodeId, always_index: bool) -> String {
        let tag = self.dom.tag(node).unwrap_or("*");
        let (position, count) = self.dom.same_tag_position(node);
        if always_index || count > 1 {
            format!("/*[local-name()={}][{}]", literal(tag), position)
        } else {
            format!("/*[local-name()={}]", literal(tag))
        }
    }

    /// Fully indexed path, anchored at `//body` when the node lives under it.
    fn absolute(&self, node: NodeId) -> Synthesized {
        let mut segments = Vec::new();
        let mut current = node;
        let mut prefix = "";
        loop {
            if self.dom.tag(current) == Some("body") {
                prefix = "//body";
                break;
            }
            segments.push(self.segment(current, true));
            match self.dom.parent_element(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        Synthesized::new(
            format!("{prefix}{}", segments.concat()),
            Tier::AbsoluteFallback,
        )
    }
}
