//! Keyed list blocks and their reconciliation.
//!
//! A list block owns a contiguous run of sibling nodes, one per item, placed
//! right after an anchor comment. When the list state changes the old and new
//! lists are matched by key:
//!
//! 1. [`plan`] decides, per new item, whether its node is reused as is,
//!    re-rendered in place, or created. Old keys that disappear become stale.
//! 2. The engine renders the nodes the plan asks for.
//! 3. [`patch`] places every node at its new slot with insert-before moves and
//!    detaches the stale ones.
//!
//! Steps 1 and 3 only talk to the host through [`NodeSequence`].

use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::dom::{NodeId, NodeSequence};
use crate::engine::Engine;
use crate::error::{Result, StructuralError};
use crate::reactive::scope::ScopeId;
use crate::reactive::store::StateKey;
use crate::reactive::value::Value;

new_key_type! {
    /// Identifies a list block.
    pub struct ListId;
}

/// Renders one list item to a single node.
pub type RenderFn = Rc<dyn Fn(&mut Engine, &Value, usize) -> Result<NodeId>>;

/// Maps an item and its index to an identity key (a string or number).
pub type KeyFn = Rc<dyn Fn(&Value, usize) -> Value>;

/// Identity key of a list item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListKey {
    Str(String),
    /// Bit pattern of a normalized `f64`.
    Num(u64),
}

impl ListKey {
    fn from_number(n: f64) -> Self {
        // -0 and 0 are the same key, as are all NaNs.
        let normalized = if n == 0.0 {
            0.0
        } else if n.is_nan() {
            f64::NAN
        } else {
            n
        };
        ListKey::Num(normalized.to_bits())
    }
}

/// Compute the key of `item` at `index`. Without an extractor the key is the
/// index itself.
pub fn extract_key(
    key_of: Option<&KeyFn>,
    item: &Value,
    index: usize,
) -> Result<ListKey, StructuralError> {
    let Some(key_of) = key_of else {
        return Ok(ListKey::from_number(index as f64));
    };
    match key_of(item, index) {
        Value::Str(s) => Ok(ListKey::Str(s)),
        Value::Number(n) => Ok(ListKey::from_number(n)),
        other => Err(StructuralError::InvalidKey {
            index,
            value: other,
        }),
    }
}

/// A registered list block.
#[derive(Clone)]
pub struct ListBlock {
    /// The state reference as written, e.g. `items` or `$todos`.
    pub source: String,
    pub scope: ScopeId,
    pub render: RenderFn,
    pub key_of: Option<KeyFn>,
    /// Node of the first item, `None` while the list is empty.
    pub first: Option<NodeId>,
    /// Parent used by the last reconciliation.
    pub parent: Option<NodeId>,
    /// Comment placed right before the items.
    pub anchor: NodeId,
}

/// Registry of list blocks.
#[derive(Default)]
pub struct ListBlocks {
    blocks: SlotMap<ListId, ListBlock>,
    by_state: HashMap<StateKey, Vec<ListId>>,
}

impl ListBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: StateKey, block: ListBlock) -> ListId {
        let id = self.blocks.insert(block);
        self.by_state.entry(key).or_default().push(id);
        id
    }

    pub fn ids_for(&self, key: &StateKey) -> Vec<ListId> {
        self.by_state.get(key).cloned().unwrap_or_default()
    }

    pub fn get(&self, id: ListId) -> Option<&ListBlock> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: ListId) -> Option<&mut ListBlock> {
        self.blocks.get_mut(id)
    }

    /// Forget every block owned by a component scope.
    pub fn drop_components(&mut self) {
        self.blocks.retain(|_, block| block.scope.is_global());
        let blocks = &self.blocks;
        self.by_state.retain(|_, ids| {
            ids.retain(|id| blocks.contains_key(*id));
            !ids.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// The parent the block's nodes live under: the first item's parent, else the
/// last known parent, else the anchor's parent.
pub fn resolve_parent<H: NodeSequence + ?Sized>(host: &H, block: &ListBlock) -> Option<NodeId> {
    block
        .first
        .filter(|&first| host.contains(first))
        .and_then(|first| host.parent(first))
        .or(block.parent.filter(|&parent| host.contains(parent)))
        .or_else(|| host.parent(block.anchor))
}

/// Locate the sibling run holding the old list: `(start index, nodes)`.
///
/// The run starts at the first item, or right after the anchor when the list
/// was empty, and spans at most `len` siblings.
pub fn old_window<H: NodeSequence + ?Sized>(
    host: &H,
    parent: NodeId,
    block: &ListBlock,
    len: usize,
) -> (usize, Vec<NodeId>) {
    let children = host.children(parent);
    let start = block
        .first
        .and_then(|first| children.iter().position(|&c| c == first))
        .or_else(|| {
            children
                .iter()
                .position(|&c| c == block.anchor)
                .map(|i| i + 1)
        })
        .unwrap_or(children.len());
    let end = (start + len).min(children.len());
    (start, children[start..end].to_vec())
}

/// What to do for one item of the new list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Same key, deep-equal item: keep the node untouched.
    Reuse(NodeId),
    /// Same key, changed item: render again and replace this node.
    Rerender(NodeId),
    /// New key: render and insert.
    Create,
}

/// Result of matching the old list against the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// One step per new item, in order.
    pub steps: Vec<Step>,
    /// Old nodes whose keys are gone.
    pub stale: Vec<NodeId>,
}

/// Match `new_items` against `old_items` (rendered as `old_nodes`) by key.
pub fn plan(
    old_items: &[Value],
    old_nodes: &[NodeId],
    new_items: &[Value],
    key_of: Option<&KeyFn>,
) -> Result<Plan, StructuralError> {
    let mut old_map: HashMap<ListKey, (usize, NodeId)> = HashMap::with_capacity(old_nodes.len());
    let mut stale = Vec::new();
    for (index, (item, &node)) in old_items.iter().zip(old_nodes).enumerate() {
        let key = extract_key(key_of, item, index)?;
        // A duplicated old key shadows the earlier node, which is then stale.
        if let Some((_, shadowed)) = old_map.insert(key, (index, node)) {
            stale.push(shadowed);
        }
    }

    let mut steps = Vec::with_capacity(new_items.len());
    for (index, item) in new_items.iter().enumerate() {
        let key = extract_key(key_of, item, index)?;
        let step = match old_map.remove(&key) {
            Some((old_index, node)) if old_items[old_index] == *item => Step::Reuse(node),
            Some((_, node)) => Step::Rerender(node),
            None => Step::Create,
        };
        steps.push(step);
    }

    let mut leftovers: Vec<(usize, NodeId)> = old_map.into_values().collect();
    leftovers.sort_by_key(|(index, _)| *index);
    stale.extend(leftovers.into_iter().map(|(_, node)| node));
    Ok(Plan { steps, stale })
}

/// Where a node of the new list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Keep(NodeId),
    Replace { old: NodeId, new: NodeId },
    Insert(NodeId),
}

impl Placement {
    pub fn node(self) -> NodeId {
        match self {
            Placement::Keep(node) | Placement::Insert(node) => node,
            Placement::Replace { new, .. } => new,
        }
    }
}

/// Apply placements so that the new list occupies `start..start + len` under
/// `parent`, then detach the stale nodes.
pub fn patch<H: NodeSequence + ?Sized>(
    host: &mut H,
    parent: NodeId,
    start: usize,
    placements: &[Placement],
    stale: &[NodeId],
) {
    for (offset, placement) in placements.iter().enumerate() {
        if let Placement::Replace { old, new } = *placement {
            host.replace_child(parent, new, old);
        }
        let node = placement.node();
        let target = start + offset;
        let children = host.children(parent);
        if children.get(target) == Some(&node) {
            continue;
        }
        let reference = children.get(target).copied();
        host.insert_before(parent, node, reference);
    }
    for &node in stale {
        host.remove_child(parent, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use slotmap::SecondaryMap;

    /// Minimal in-memory host: flat parent/children maps, nothing else.
    #[derive(Default)]
    struct FakeHost {
        ids: SlotMap<NodeId, &'static str>,
        children: SecondaryMap<NodeId, Vec<NodeId>>,
        parent: SecondaryMap<NodeId, NodeId>,
    }

    impl FakeHost {
        fn node(&mut self, label: &'static str) -> NodeId {
            let id = self.ids.insert(label);
            self.children.insert(id, Vec::new());
            id
        }

        fn labels(&self, parent: NodeId) -> Vec<&'static str> {
            self.children[parent].iter().map(|&c| self.ids[c]).collect()
        }

        fn detach(&mut self, node: NodeId) {
            if let Some(p) = self.parent.remove(node) {
                self.children[p].retain(|&c| c != node);
            }
        }
    }

    impl NodeSequence for FakeHost {
        fn contains(&self, node: NodeId) -> bool {
            self.ids.contains_key(node)
        }

        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.parent.get(node).copied()
        }

        fn children(&self, parent: NodeId) -> &[NodeId] {
            &self.children[parent]
        }

        fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
            self.detach(node);
            let siblings = &mut self.children[parent];
            let at = reference
                .and_then(|r| siblings.iter().position(|&c| c == r))
                .unwrap_or(siblings.len());
            siblings.insert(at, node);
            self.parent.insert(node, parent);
        }

        fn remove_child(&mut self, _parent: NodeId, node: NodeId) {
            self.detach(node);
        }

        fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) {
            self.insert_before(parent, new, Some(old));
            self.detach(old);
        }
    }

    fn by_id() -> KeyFn {
        Rc::new(|item: &Value, _: usize| item.get("id").cloned().unwrap_or(Value::Null))
    }

    fn items(json: serde_json::Value) -> Vec<Value> {
        match Value::from(json) {
            Value::List(items) => items,
            _ => unreachable!(),
        }
    }

    /// A parent holding `[before, <anchor>, items..., after]`.
    fn setup(labels: &[&'static str]) -> (FakeHost, NodeId, NodeId, Vec<NodeId>) {
        let mut host = FakeHost::default();
        let parent = host.node("ul");
        let before = host.node("before");
        let anchor = host.node("anchor");
        host.insert_before(parent, before, None);
        host.insert_before(parent, anchor, None);
        let nodes: Vec<NodeId> = labels
            .iter()
            .map(|label| {
                let n = host.node(label);
                host.insert_before(parent, n, None);
                n
            })
            .collect();
        let after = host.node("after");
        host.insert_before(parent, after, None);
        (host, parent, anchor, nodes)
    }

    fn block(anchor: NodeId, first: Option<NodeId>) -> ListBlock {
        ListBlock {
            source: "items".into(),
            scope: ScopeId::Global,
            render: Rc::new(|_: &mut Engine, _: &Value, _: usize| -> Result<NodeId> { unreachable!() }),
            key_of: Some(by_id()),
            first,
            parent: None,
            anchor,
        }
    }

    #[test]
    fn reorder_reuses_every_node() {
        let old = items(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        let new = items(json!([{"id": 3}, {"id": 1}, {"id": 2}]));
        let (mut host, parent, anchor, nodes) = setup(&["1", "2", "3"]);
        let blk = block(anchor, Some(nodes[0]));

        let (start, window) = old_window(&host, parent, &blk, old.len());
        assert_eq!(start, 2);
        assert_eq!(window, nodes);

        let plan = plan(&old, &window, &new, blk.key_of.as_ref()).unwrap();
        assert_eq!(
            plan.steps,
            vec![
                Step::Reuse(nodes[2]),
                Step::Reuse(nodes[0]),
                Step::Reuse(nodes[1])
            ]
        );
        assert!(plan.stale.is_empty());

        let placements: Vec<Placement> = plan
            .steps
            .iter()
            .map(|step| match step {
                Step::Reuse(n) => Placement::Keep(*n),
                _ => unreachable!(),
            })
            .collect();
        patch(&mut host, parent, start, &placements, &plan.stale);
        assert_eq!(
            host.labels(parent),
            vec!["before", "anchor", "3", "1", "2", "after"]
        );
    }

    #[test]
    fn removal_detaches_only_that_node() {
        let old = items(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        let new = items(json!([{"id": 1}, {"id": 3}]));
        let (mut host, parent, anchor, nodes) = setup(&["1", "2", "3"]);
        let blk = block(anchor, Some(nodes[0]));
        let (start, window) = old_window(&host, parent, &blk, old.len());
        let plan = plan(&old, &window, &new, blk.key_of.as_ref()).unwrap();
        assert_eq!(plan.stale, vec![nodes[1]]);

        let placements = [Placement::Keep(nodes[0]), Placement::Keep(nodes[2])];
        patch(&mut host, parent, start, &placements, &plan.stale);
        assert_eq!(host.labels(parent), vec!["before", "anchor", "1", "3", "after"]);
        assert_eq!(host.parent(nodes[1]), None);
    }

    #[test]
    fn append_inserts_one_node_at_the_end() {
        let old = items(json!([{"id": 1}, {"id": 2}]));
        let new = items(json!([{"id": 1}, {"id": 2}, {"id": 4}]));
        let (mut host, parent, anchor, nodes) = setup(&["1", "2"]);
        let blk = block(anchor, Some(nodes[0]));
        let (start, window) = old_window(&host, parent, &blk, old.len());
        let plan = plan(&old, &window, &new, blk.key_of.as_ref()).unwrap();
        assert_eq!(plan.steps[2], Step::Create);

        let fresh = host.node("4");
        let placements = [
            Placement::Keep(nodes[0]),
            Placement::Keep(nodes[1]),
            Placement::Insert(fresh),
        ];
        patch(&mut host, parent, start, &placements, &plan.stale);
        assert_eq!(
            host.labels(parent),
            vec!["before", "anchor", "1", "2", "4", "after"]
        );
    }

    #[test]
    fn changed_item_is_rerendered_in_place() {
        let old = items(json!([{"id": 1}, {"id": 2, "v": "a"}, {"id": 3}]));
        let new = items(json!([{"id": 1}, {"id": 2, "v": "b"}, {"id": 3}]));
        let (mut host, parent, anchor, nodes) = setup(&["1", "2a", "3"]);
        let blk = block(anchor, Some(nodes[0]));
        let (start, window) = old_window(&host, parent, &blk, old.len());
        let plan = plan(&old, &window, &new, blk.key_of.as_ref()).unwrap();
        assert_eq!(plan.steps[1], Step::Rerender(nodes[1]));

        let fresh = host.node("2b");
        let placements = [
            Placement::Keep(nodes[0]),
            Placement::Replace {
                old: nodes[1],
                new: fresh,
            },
            Placement::Keep(nodes[2]),
        ];
        patch(&mut host, parent, start, &placements, &plan.stale);
        assert_eq!(
            host.labels(parent),
            vec!["before", "anchor", "1", "2b", "3", "after"]
        );
    }

    #[test]
    fn empty_list_inserts_after_anchor() {
        let (mut host, parent, anchor, _) = setup(&[]);
        let blk = block(anchor, None);
        let (start, window) = old_window(&host, parent, &blk, 0);
        assert_eq!(start, 2);
        assert!(window.is_empty());

        let a = host.node("a");
        let b = host.node("b");
        patch(
            &mut host,
            parent,
            start,
            &[Placement::Insert(a), Placement::Insert(b)],
            &[],
        );
        assert_eq!(
            host.labels(parent),
            vec!["before", "anchor", "a", "b", "after"]
        );
    }

    #[test]
    fn parent_resolution_order() {
        let (mut host, parent, anchor, nodes) = setup(&["1"]);
        let mut blk = block(anchor, Some(nodes[0]));
        assert_eq!(resolve_parent(&host, &blk), Some(parent));

        blk.first = None;
        assert_eq!(resolve_parent(&host, &blk), Some(parent));

        host.detach(anchor);
        assert_eq!(resolve_parent(&host, &blk), None);

        blk.parent = Some(parent);
        assert_eq!(resolve_parent(&host, &blk), Some(parent));
    }

    #[test]
    fn invalid_key_reports_index_and_value() {
        let old = items(json!([]));
        let new = items(json!([{"id": 1}, {"id": true}]));
        let err = plan(&old, &[], &new, Some(&by_id())).unwrap_err();
        assert_eq!(
            err,
            StructuralError::InvalidKey {
                index: 1,
                value: Value::Bool(true)
            }
        );
    }

    #[test]
    fn positional_keys_without_extractor() {
        let old = items(json!(["a", "b"]));
        let new = items(json!(["a", "c", "d"]));
        let (host, parent, anchor, nodes) = setup(&["a", "b"]);
        let mut blk = block(anchor, Some(nodes[0]));
        blk.key_of = None;
        let (_, window) = old_window(&host, parent, &blk, old.len());
        let plan = plan(&old, &window, &new, None).unwrap();
        assert_eq!(
            plan.steps,
            vec![Step::Reuse(nodes[0]), Step::Rerender(nodes[1]), Step::Create]
        );
    }

    #[test]
    fn duplicate_old_keys_mark_shadowed_node_stale() {
        let old = items(json!([{"id": 1}, {"id": 1}]));
        let new = items(json!([{"id": 1}]));
        let (host, parent, anchor, nodes) = setup(&["1", "1'"]);
        let blk = block(anchor, Some(nodes[0]));
        let (_, window) = old_window(&host, parent, &blk, old.len());
        let plan = plan(&old, &window, &new, blk.key_of.as_ref()).unwrap();
        assert_eq!(plan.steps, vec![Step::Reuse(nodes[1])]);
        assert_eq!(plan.stale, vec![nodes[0]]);
    }

    #[test]
    fn numeric_keys_normalize_zero() {
        assert_eq!(ListKey::from_number(0.0), ListKey::from_number(-0.0));
        assert_ne!(ListKey::from_number(1.0), ListKey::Str("1".into()));
    }
}
