//! Node types: NodeId, NodeKind, NodeData.

use slotmap::new_key_type;

new_key_type! {
    /// Unique identifier for a DOM node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An element with a tag name, e.g. `div`.
    Element(String),
    /// A text node.
    Text(String),
    /// A comment node. List blocks use one as their position anchor.
    Comment(String),
    /// A document fragment: inserting it moves its children and leaves it empty.
    Fragment,
}

/// Data associated with a single DOM node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Element attributes in insertion order. Ignored for non-elements.
    pub attributes: Vec<(String, String)>,
}

impl NodeData {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
        }
    }

    /// An element node.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Element(tag.into()))
    }

    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text(text.into()))
    }

    /// A comment node.
    pub fn comment(text: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Comment(text.into()))
    }

    /// An empty fragment.
    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment)
    }

    /// Set an attribute (builder).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Set or overwrite an attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Character data of text and comment nodes.
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, NodeKind::Fragment)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }
}
