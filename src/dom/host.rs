//! The ordered-node-sequence interface the list reconciler patches through.
//!
//! Reconciliation only needs to read a parent's children and move, insert,
//! replace or remove single nodes. Keeping it behind this trait lets the
//! algorithm run against [`Dom`](super::Dom) or any other host tree.

use super::node::NodeId;

pub trait NodeSequence {
    /// Whether the node exists in the host.
    fn contains(&self, node: NodeId) -> bool;

    /// Current parent of `node`.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children of `parent` in order.
    fn children(&self, parent: NodeId) -> &[NodeId];

    /// Insert (or move) `node` under `parent` before `reference`, or at the
    /// end when `reference` is `None`.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);

    /// Detach `node` from `parent`.
    fn remove_child(&mut self, parent: NodeId, node: NodeId);

    /// Put `new` where `old` is under `parent`, detaching `old`.
    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId);

    /// Position of `node` among its parent's children.
    fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }
}
