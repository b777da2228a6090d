//! Text interpolation bindings.
//!
//! A literal text child such as `"count: {{ count }}"` is split into literal
//! parts and placeholder slots. Each slot remembers the text it last rendered,
//! so its byte span inside the node can be recomputed and overwritten in
//! place when a state it reads changes.

use std::collections::HashMap;

use slotmap::SecondaryMap;
use tracing::{trace, warn};

use crate::dom::{Dom, NodeId};
use crate::error::ExprError;
use crate::expr::CompiledExpr;
use crate::reactive::scope::ScopeId;
use crate::reactive::store::{StateKey, StateStore};

/// A piece of a split template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    /// Inner expression text of a placeholder, untrimmed.
    Placeholder(&'a str),
}

/// Split `text` on `open ... close` placeholders. Both delimiters must be
/// non-empty.
pub fn split_template<'a>(
    text: &'a str,
    open: &str,
    close: &str,
) -> Result<Vec<Piece<'a>>, ExprError> {
    if open.is_empty() || close.is_empty() {
        return Err(ExprError::EmptyDelimiter);
    }
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            return Err(ExprError::UnterminatedPlaceholder(text.to_owned()));
        };
        pieces.push(Piece::Placeholder(&after_open[..end]));
        rest = &after_open[end + close.len()..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// One part of a bound text node.
#[derive(Debug, Clone)]
pub enum Part {
    Literal(String),
    Slot {
        expr: CompiledExpr,
        /// Text currently written for this slot.
        rendered: String,
    },
}

impl Part {
    fn len(&self) -> usize {
        match self {
            Part::Literal(text) => text.len(),
            Part::Slot { rendered, .. } => rendered.len(),
        }
    }
}

/// The parts of one text node plus the scope its slots evaluate in.
#[derive(Debug, Clone)]
pub struct TextTemplate {
    pub scope: ScopeId,
    pub parts: Vec<Part>,
}

impl TextTemplate {
    /// Full text as currently rendered.
    pub fn rendered(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Literal(text) => text.as_str(),
                Part::Slot { rendered, .. } => rendered.as_str(),
            })
            .collect()
    }

    pub fn has_slots(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Slot { .. }))
    }
}

/// Registry of bound text nodes, keyed by the state each slot reads.
#[derive(Debug, Default)]
pub struct TextBindings {
    templates: SecondaryMap<NodeId, TextTemplate>,
    by_state: HashMap<StateKey, Vec<(NodeId, usize)>>,
}

impl TextBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every slot of `template` under the state keys it reads.
    pub fn register(&mut self, node: NodeId, template: TextTemplate) {
        for (slot, part) in template.parts.iter().enumerate() {
            let Part::Slot { expr, .. } = part else {
                continue;
            };
            for key in expr.dependencies(template.scope) {
                let targets = self.by_state.entry(key).or_default();
                if !targets.contains(&(node, slot)) {
                    targets.push((node, slot));
                }
            }
        }
        self.templates.insert(node, template);
    }

    /// `(node, slot)` positions that read `key`.
    pub fn targets(&self, key: &StateKey) -> Vec<(NodeId, usize)> {
        self.by_state.get(key).cloned().unwrap_or_default()
    }

    /// Re-evaluate one slot from current state and overwrite its span in the
    /// node. Returns whether the node text changed.
    pub fn refresh(
        &mut self,
        dom: &mut Dom,
        store: &StateStore,
        node: NodeId,
        slot: usize,
    ) -> Result<bool, ExprError> {
        let Some(template) = self.templates.get_mut(node) else {
            return Ok(false);
        };
        let offset: usize = template.parts[..slot].iter().map(Part::len).sum();
        let scope = template.scope;
        let Some(Part::Slot { expr, rendered }) = template.parts.get_mut(slot) else {
            return Ok(false);
        };

        let next = expr.evaluate(store, scope)?.to_string();
        if next == *rendered {
            return Ok(false);
        }
        let span = offset..offset + rendered.len();
        if !dom.splice_text(node, span.clone(), &next) {
            warn!(?node, "bound text node is gone; skipping patch");
            return Ok(false);
        }
        trace!(?node, slot, ?span, text = %next, "text binding patched");
        *rendered = next;
        Ok(true)
    }

    /// Forget every template owned by a component scope.
    pub fn drop_components(&mut self) {
        self.templates.retain(|_, template| template.scope.is_global());
        let templates = &self.templates;
        self.by_state.retain(|_, targets| {
            targets.retain(|(node, _)| templates.contains_key(*node));
            !targets.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
