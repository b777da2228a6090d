//! Tree operations: create, insert, move, replace, remove, serialize.

use std::collections::VecDeque;
use std::fmt::Write as _;

use slotmap::{SecondaryMap, SlotMap};

use super::host::NodeSequence;
use super::node::{NodeData, NodeId, NodeKind};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// The node tree, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps. Detaching a node keeps it in the arena so it can be
/// re-inserted later; [`Dom::remove`] deletes a subtree for good.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Dom {
    /// Create an empty DOM.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            root: None,
        }
    }

    /// Create a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create(NodeData::element(tag))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeData::text(text))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.create(NodeData::comment(text))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.create(NodeData::fragment())
    }

    /// Append `child` to `parent`, moving it from any previous parent.
    /// Appending a fragment moves the fragment's children instead.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Detach a node from its parent, keeping it (and its subtree) in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent_id) = self.parent.remove(id) {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|&child| child != id);
            }
        }
    }

    /// Remove a node and all its descendants from the arena.
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't exist.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) {
            return None;
        }

        self.detach(id);

        if self.root == Some(id) {
            self.root = None;
        }

        // Collect all descendants (BFS) to remove them.
        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            let data = self.nodes.remove(current);
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data
    }

    /// Remove every child subtree of `id` from the arena.
    pub fn clear_children(&mut self, id: NodeId) {
        let kids = self.children(id).to_vec();
        for kid in kids {
            self.remove(kid);
        }
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to the root, collecting ancestor node ids.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// Character data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).and_then(NodeData::text_content)
    }

    /// Replace a byte range of a text node's data in place.
    pub fn splice_text(&mut self, id: NodeId, range: std::ops::Range<usize>, text: &str) -> bool {
        match self.nodes.get_mut(id).map(|data| &mut data.kind) {
            Some(NodeKind::Text(current)) if range.end <= current.len() => {
                current.replace_range(range, text);
                true
            }
            _ => false,
        }
    }

    /// The current root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Explicitly set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena (attached or not).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the DOM is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Serialize a subtree as HTML-like markup.
    ///
    /// Text is written verbatim, comments as `<!--text-->`, fragments as their
    /// children only.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    /// Markup of every child of `id`, concatenated.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_markup(child, &mut out);
        }
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(id) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Fragment => {
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSequence for Dom {
    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Dom::parent(self, node)
    }

    fn children(&self, parent: NodeId) -> &[NodeId] {
        Dom::children(self, parent)
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        debug_assert!(self.nodes.contains_key(parent), "parent node does not exist");
        debug_assert!(self.nodes.contains_key(node), "node does not exist");
        if reference == Some(node) {
            return;
        }

        let moved = if self.nodes.get(node).is_some_and(NodeData::is_fragment) {
            self.children
                .get_mut(node)
                .map(std::mem::take)
                .unwrap_or_default()
        } else {
            self.detach(node);
            vec![node]
        };

        let Some(siblings) = self.children.get_mut(parent) else {
            return;
        };
        let at = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        for (offset, &id) in moved.iter().enumerate() {
            siblings.insert(at + offset, id);
        }
        for id in moved {
            self.parent.insert(id, parent);
        }
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) {
        if self.parent(node) == Some(parent) {
            self.detach(node);
        }
    }

    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) {
        if new == old || self.parent(old) != Some(parent) {
            return;
        }
        // Insert before `old` first so fragments expand in place.
        self.insert_before(parent, new, Some(old));
        self.detach(old);
    }
}
