//! Conditional blocks: two precomputed branch nodes swapped in place.
//!
//! A block is registered under every state its expression reads. The last
//! evaluated boolean is remembered per `(scope, expression text)`, so blocks
//! only toggle on a real transition and blocks sharing an expression toggle
//! together exactly once.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};

use crate::dom::{Dom, NodeId, NodeSequence};
use crate::error::ExprError;
use crate::expr::CompiledExpr;
use crate::reactive::scope::ScopeId;
use crate::reactive::store::{StateKey, StateStore};
use crate::reactive::value::Value;

new_key_type! {
    /// Identifies a conditional block.
    pub struct CondId;
}

/// A branch of a conditional block, before it is turned into a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch {
    /// An already-built node. Must not be a fragment.
    Node(NodeId),
    /// Text, lifted to a text node.
    Text(String),
    /// Nothing; rendered as an empty text placeholder.
    Empty,
}

impl From<NodeId> for Branch {
    fn from(node: NodeId) -> Self {
        Branch::Node(node)
    }
}

impl From<Option<NodeId>> for Branch {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Branch::Empty, Branch::Node)
    }
}

impl From<&str> for Branch {
    fn from(text: &str) -> Self {
        Branch::Text(text.to_owned())
    }
}

impl From<String> for Branch {
    fn from(text: String) -> Self {
        Branch::Text(text)
    }
}

impl From<Value> for Branch {
    /// Falsy values render nothing.
    fn from(value: Value) -> Self {
        if value.is_truthy() {
            Branch::Text(value.to_string())
        } else {
            Branch::Empty
        }
    }
}

/// A registered conditional block.
#[derive(Debug, Clone)]
pub struct CondBlock {
    pub expr: CompiledExpr,
    pub scope: ScopeId,
    pub true_node: NodeId,
    pub false_node: NodeId,
}

impl CondBlock {
    fn node_for(&self, value: bool) -> NodeId {
        if value {
            self.true_node
        } else {
            self.false_node
        }
    }
}

/// Registry of conditional blocks.
#[derive(Debug, Default)]
pub struct Conditionals {
    blocks: SlotMap<CondId, CondBlock>,
    by_state: HashMap<StateKey, Vec<CondId>>,
    last: HashMap<(ScopeId, String), bool>,
}

impl Conditionals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block whose expression currently evaluates to `initial`.
    pub fn register(&mut self, block: CondBlock, initial: bool) -> CondId {
        let deps = block.expr.dependencies(block.scope);
        self.last
            .insert((block.scope, block.expr.source().to_owned()), initial);
        let id = self.blocks.insert(block);
        for key in deps {
            let ids = self.by_state.entry(key).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        id
    }

    pub fn get(&self, id: CondId) -> Option<&CondBlock> {
        self.blocks.get(id)
    }

    /// The branch node that should currently be attached.
    pub fn active_node(&self, id: CondId) -> Option<NodeId> {
        let block = self.blocks.get(id)?;
        let value = *self
            .last
            .get(&(block.scope, block.expr.source().to_owned()))?;
        Some(block.node_for(value))
    }

    /// Re-evaluate every block reading `key` and swap the ones whose value
    /// changed. Returns the number of blocks swapped.
    pub fn refresh(
        &mut self,
        dom: &mut Dom,
        store: &StateStore,
        key: &StateKey,
    ) -> Result<usize, ExprError> {
        let Some(ids) = self.by_state.get(key) else {
            return Ok(0);
        };

        // Group by (scope, expression text), keeping first-seen order.
        let mut groups: Vec<((ScopeId, String), Vec<CondId>)> = Vec::new();
        for &id in ids {
            let Some(block) = self.blocks.get(id) else {
                continue;
            };
            let group_key = (block.scope, block.expr.source().to_owned());
            match groups.iter_mut().find(|(k, _)| *k == group_key) {
                Some((_, members)) => members.push(id),
                None => groups.push((group_key, vec![id])),
            }
        }

        let mut swapped = 0;
        for (group_key, members) in groups {
            let value = self.blocks[members[0]]
                .expr
                .evaluate(store, group_key.0)?
                .is_truthy();
            let previous = self.last.get(&group_key).copied();
            if previous == Some(value) {
                trace!(expr = %group_key.1, value, "condition unchanged");
                continue;
            }
            for id in members {
                let block = &self.blocks[id];
                if swap(dom, block.node_for(!value), block.node_for(value)) {
                    swapped += 1;
                }
            }
            debug!(scope = %group_key.0, expr = %group_key.1, value, "conditional toggled");
            self.last.insert(group_key, value);
        }
        Ok(swapped)
    }

    /// Forget every block owned by a component scope.
    pub fn drop_components(&mut self) {
        self.blocks.retain(|_, block| block.scope.is_global());
        self.last.retain(|(scope, _), _| scope.is_global());
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

/// Put `to` where `from` is attached. Returns `false` when `from` is detached.
fn swap(dom: &mut Dom, from: NodeId, to: NodeId) -> bool {
    let Some(parent) = dom.parent(from) else {
        trace!(?from, "inactive branch not attached; nothing to swap");
        return false;
    };
    dom.replace_child(parent, to, from);
    true
}
