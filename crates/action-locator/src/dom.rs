//! In-memory DOM snapshot.
//!
//! The snapshot is an arena of nodes stored in pre-order, so comparing two [`NodeId`]s
//! compares their document order. Whitespace-only text nodes are kept because `text()`
//! based locators observe them.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::errors::LocatorError;

/// Index of a node inside a [`PageDom`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct DomNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Parsed page snapshot.
#[derive(Debug, Clone)]
pub struct PageDom {
    nodes: Vec<DomNode>,
}

impl PageDom {
    /// Parse an HTML document (fragments are wrapped in `html`/`body` by the parser).
    pub fn parse(html: &str) -> Result<Self, LocatorError> {
        let dom: RcDom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())
            .map_err(|err| LocatorError::Parse(err.to_string()))?;

        let mut page = Self {
            nodes: vec![DomNode {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        };
        for child in dom.document.children.borrow().iter() {
            page.convert(child, 0);
        }
        Ok(page)
    }

    fn convert(&mut self, handle: &Handle, parent: NodeId) {
        let kind = match &handle.data {
            RcNodeData::Element { name, attrs, .. } => NodeKind::Element {
                tag: name.local.to_string(),
                attrs: attrs
                    .borrow()
                    .iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect(),
            },
            RcNodeData::Text { contents } => NodeKind::Text(contents.borrow().to_string()),
            RcNodeData::Comment { contents } => NodeKind::Comment(contents.to_string()),
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => return,
        };

        let id = self.nodes.len();
        self.nodes.push(DomNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);

        for child in handle.children.borrow().iter() {
            self.convert(child, id);
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// Lowercase tag name of an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Raw text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    pub fn text_children(&self, id: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.children(id)
            .iter()
            .filter_map(move |child| self.text(*child))
    }

    /// Ancestors from the parent up to the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// `id` followed by all of its descendants in document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// All elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |id| self.is_element(*id))
    }

    /// Concatenation of every descendant text node (`textContent`).
    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Immediate text children, each trimmed, joined by one space, with inner whitespace
    /// collapsed so the result compares equal under `normalize-space`.
    pub fn direct_text(&self, id: NodeId) -> String {
        let joined = self
            .text_children(id)
            .map(|text| text.trim_matches(is_xml_space))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        normalize_space(&joined)
    }

    pub fn body(&self) -> Option<NodeId> {
        self.elements().find(|id| self.tag(*id) == Some("body"))
    }

    pub fn find(&self, mut predicate: impl FnMut(&PageDom, NodeId) -> bool) -> Option<NodeId> {
        self.elements().find(|id| predicate(self, *id))
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.find(|dom, id| dom.attr(id, "id") == Some(value))
    }

    /// 1-based position among the parent's element children sharing the same tag,
    /// and the number of such siblings.
    pub fn same_tag_position(&self, id: NodeId) -> (usize, usize) {
        let Some(tag) = self.tag(id) else {
            return (1, 1);
        };
        let Some(parent) = self.parent(id) else {
            return (1, 1);
        };
        let mut position = 1;
        let mut count = 0;
        for sibling in self.element_children(parent) {
            if self.tag(sibling) == Some(tag) {
                count += 1;
                if sibling < id {
                    position += 1;
                }
            }
        }
        (position, count.max(1))
    }
}

/// XPath `normalize-space`: trim and collapse whitespace runs to one space.
/// Only XML whitespace counts; U+00A0 and other Unicode spaces are kept.
pub fn normalize_space(value: &str) -> String {
    value
        .split(is_xml_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_xml_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_get_wrapped_in_body() {
        let dom = PageDom::parse("<button id=\"go\">Go</button>").unwrap();
        let body = dom.body().unwrap();
        let button = dom.element_by_id("go").unwrap();
        assert_eq!(dom.parent_element(button), Some(body));
        assert_eq!(dom.tag(button), Some("button"));
        assert_eq!(dom.text_content(button), "Go");
    }

    #[test]
    fn ids_follow_document_order() {
        let dom = PageDom::parse("<ul><li>a</li><li>b</li></ul><p>c</p>").unwrap();
        let items: Vec<_> = dom.elements().filter(|id| dom.tag(*id) == Some("li")).collect();
        let p = dom.find(|d, id| d.tag(id) == Some("p")).unwrap();
        assert!(items[0] < items[1] && items[1] < p);
        assert_eq!(dom.same_tag_position(items[1]), (2, 2));
        assert_eq!(dom.same_tag_position(p), (1, 1));
    }

    #[test]
    fn direct_text_skips_nested_elements() {
        let dom = PageDom::parse("<div id=\"d\">  Hello <b>bold</b>\n  world  </div>").unwrap();
        let div = dom.element_by_id("d").unwrap();
        assert_eq!(dom.direct_text(div), "Hello world");
        assert_eq!(dom.text_content(div), "  Hello bold\n  world  ");
    }

    #[test]
    fn normalize_space_only_collapses_xml_whitespace() {
        assert_eq!(normalize_space(" \t a \r\n b  "), "a b");
        assert_eq!(normalize_space("a\u{a0}b"), "a\u{a0}b");
        assert_eq!(normalize_space("\u{a0}x\u{a0}"), "\u{a0}x\u{a0}");

        let dom = PageDom::parse("<p id=\"p\"> Save&nbsp;now </p>").unwrap();
        let p = dom.element_by_id("p").unwrap();
        assert_eq!(dom.direct_text(p), "Save\u{a0}now");
    }
}
