//! Explicit event wiring.
//!
//! Handlers are attached to a `(node, event name)` pair and run synchronously
//! when [`Engine::dispatch`](crate::engine::Engine::dispatch) delivers an
//! [`Event`]. Delivery bubbles from the target up to the root, the same path
//! [`EventHandlers::bubble_path`] computes.

use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::dom::{Dom, NodeId};
use crate::engine::Engine;
use crate::error::Result;
use crate::reactive::scope::ScopeId;
use crate::reactive::value::Value;

new_key_type! {
    /// Identifies an attached handler.
    pub struct HandlerId;
}

/// A named event aimed at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    /// Payload, e.g. the new value of an input.
    pub detail: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            detail: Value::Null,
        }
    }

    /// Attach a payload (builder).
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// A handler callback. Setters called from it run synchronously.
pub type HandlerFn = Rc<dyn Fn(&mut Engine, &Event) -> Result<()>>;

struct HandlerRecord {
    owner: ScopeId,
    callback: HandlerFn,
}

// ---------------------------------------------------------------------------
// EventHandlers
// ---------------------------------------------------------------------------

/// Handlers keyed by target node and event name.
#[derive(Default)]
pub struct EventHandlers {
    handlers: SlotMap<HandlerId, HandlerRecord>,
    by_target: HashMap<(NodeId, String), Vec<HandlerId>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `callback` for `event` on `node`, owned by `owner`.
    pub fn register(
        &mut self,
        node: NodeId,
        event: &str,
        owner: ScopeId,
        callback: HandlerFn,
    ) -> HandlerId {
        let id = self.handlers.insert(HandlerRecord { owner, callback });
        self.by_target
            .entry((node, event.to_owned()))
            .or_default()
            .push(id);
        id
    }

    /// Handlers on `node` for `event`, in attachment order, with their owners.
    pub fn handlers_for(&self, node: NodeId, event: &str) -> Vec<(ScopeId, HandlerFn)> {
        self.by_target
            .get(&(node, event.to_owned()))
            .into_iter()
            .flatten()
            .filter_map(|&id| self.handlers.get(id))
            .map(|record| (record.owner, Rc::clone(&record.callback)))
            .collect()
    }

    /// `[start, parent, ..., root]`, or empty when `start` is gone.
    pub fn bubble_path(dom: &Dom, start: NodeId) -> Vec<NodeId> {
        if !dom.contains(start) {
            return Vec::new();
        }
        let mut path = vec![start];
        path.extend(dom.ancestors(start));
        path
    }

    /// Detach every handler attached while a component scope was active.
    pub fn drop_components(&mut self) {
        self.handlers.retain(|_, record| record.owner.is_global());
        let handlers = &self.handlers;
        self.by_target.retain(|_, ids| {
            ids.retain(|id| handlers.contains_key(*id));
            !ids.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
