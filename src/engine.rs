//! The engine: one explicit context object owning the node tree, the scope
//! stack, all state and every binding registry.
//!
//! Tree construction goes through the engine (`text`, `when`, `map_list`,
//! ...), which records what each produced node depends on. A write through a
//! [`Setter`] then runs, synchronously and in order:
//!
//! 1. the deep-equality check (an equal value stops here),
//! 2. the commit,
//! 3. text binding patches,
//! 4. conditional block toggles,
//! 5. keyed list reconciliation,
//! 6. dependent effects, in registration order.
//!
//! Effects, list render functions and event handlers receive `&mut Engine`,
//! so they may write state again; such writes recurse synchronously.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bind::conditional::{Branch, CondBlock, Conditionals};
use crate::bind::list::{
    extract_key, old_window, patch, plan, resolve_parent, KeyFn, ListBlock, ListBlocks, ListId,
    Placement, RenderFn, Step,
};
use crate::bind::text::{split_template, Part, Piece, TextBindings, TextTemplate};
use crate::dom::{Dom, NodeData, NodeId};
use crate::error::{DeclarationError, Result, StructuralError};
use crate::event::{Event, EventHandlers, HandlerFn, HandlerId};
use crate::expr::CompiledExpr;
use crate::reactive::effect::{EffectFn, EffectId, EffectOptions, EffectRegistry};
use crate::reactive::scope::{ScopeId, ScopeStack};
use crate::reactive::store::{Setter, StateKey, StateStore, StateView};
use crate::reactive::value::Value;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Opening delimiter of an interpolation placeholder.
    pub open_delimiter: String,
    /// Closing delimiter of an interpolation placeholder.
    pub close_delimiter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            open_delimiter: "{{".into(),
            close_delimiter: "}}".into(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both placeholder delimiters (builder).
    pub fn with_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open_delimiter = open.into();
        self.close_delimiter = close.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reactive binding and reconciliation engine.
pub struct Engine {
    dom: Dom,
    scopes: ScopeStack,
    store: StateStore,
    texts: TextBindings,
    conditionals: Conditionals,
    lists: ListBlocks,
    effects: EffectRegistry,
    events: EventHandlers,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            dom: Dom::new(),
            scopes: ScopeStack::new(),
            store: StateStore::new(),
            texts: TextBindings::new(),
            conditionals: Conditionals::new(),
            lists: ListBlocks::new(),
            effects: EffectRegistry::new(),
            events: EventHandlers::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn texts(&self) -> &TextBindings {
        &self.texts
    }

    pub fn conditionals(&self) -> &Conditionals {
        &self.conditionals
    }

    pub fn lists(&self) -> &ListBlocks {
        &self.lists
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn events(&self) -> &EventHandlers {
        &self.events
    }

    // ── Scopes ───────────────────────────────────────────────────────

    /// Mark the root render pass as started.
    pub fn begin_render(&mut self) {
        self.scopes.begin_render();
    }

    pub fn active_scope(&self) -> ScopeId {
        self.scopes.active()
    }

    /// Run `build` inside a fresh component scope. The scope is exited even
    /// when `build` fails.
    pub fn component<T>(&mut self, build: impl FnOnce(&mut Engine) -> Result<T>) -> Result<T> {
        let scope = self.scopes.enter_component()?;
        trace!(%scope, "component scope entered");
        let result = build(self);
        self.scopes.exit()?;
        result
    }

    /// Run `f` with an existing scope active.
    pub fn with_scope<T>(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Engine) -> Result<T>,
    ) -> Result<T> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.exit()?;
        result
    }

    /// Drop every component scope together with the state, bindings, blocks,
    /// effects and handlers it owns. Global state survives.
    pub fn teardown_components(&mut self) {
        self.store.drop_components();
        self.texts.drop_components();
        self.conditionals.drop_components();
        self.lists.drop_components();
        self.effects.drop_components();
        self.events.drop_components();
        self.scopes.clear();
        debug!("component scopes torn down");
    }

    // ── State ────────────────────────────────────────────────────────

    /// Declare component state in the active scope.
    pub fn use_state(&mut self, name: &str, initial: impl Into<Value>) -> Result<Setter> {
        let scope = self.scopes.active();
        if scope.is_global() {
            return Err(DeclarationError::OutsideComponent(name.to_owned()).into());
        }
        self.store.declare(scope, name, initial.into())?;
        Ok(Setter::new(scope, name))
    }

    /// Declare state in the global scope. Read it from components as `$name`.
    pub fn use_global_state(&mut self, name: &str, initial: impl Into<Value>) -> Result<Setter> {
        self.store.declare(ScopeId::Global, name, initial.into())?;
        Ok(Setter::new(ScopeId::Global, name))
    }

    /// Setter for an already declared global state.
    pub fn global_setter(&self, name: &str) -> Result<Setter> {
        self.store.get(ScopeId::Global, name)?;
        Ok(Setter::new(ScopeId::Global, name))
    }

    /// Read `name` (or `$name`) from the active scope.
    pub fn state(&self, name: &str) -> Result<&Value> {
        Ok(self.view(self.scopes.active()).get(name)?)
    }

    pub fn view(&self, scope: ScopeId) -> StateView<'_> {
        self.store.view(scope)
    }

    /// Commit `next` and propagate it. Returns `false` for an idempotent write.
    fn write(&mut self, setter: &Setter, next: Value) -> Result<bool> {
        if *self.store.get(setter.scope, &setter.name)? == next {
            trace!(scope = %setter.scope, name = %setter.name, "write skipped: value unchanged");
            return Ok(false);
        }
        let old = self.store.replace(setter.scope, &setter.name, next)?;
        debug!(scope = %setter.scope, name = %setter.name, "state committed");

        let key = setter.key();
        for (node, slot) in self.texts.targets(&key) {
            self.texts.refresh(&mut self.dom, &self.store, node, slot)?;
        }
        self.conditionals.refresh(&mut self.dom, &self.store, &key)?;
        for id in self.lists.ids_for(&key) {
            self.reconcile_list(id, &key, &old)?;
        }
        for effect in self.effects.dependents(&key) {
            effect(self)?;
        }
        Ok(true)
    }

    // ── Tree construction ────────────────────────────────────────────

    pub fn element(&mut self, tag: &str) -> NodeId {
        self.dom.create_element(tag)
    }

    /// Append `child` under `parent`. A fragment contributes its children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.dom.append_child(parent, child);
    }

    /// Create a text node from `source`, interpolating every placeholder
    /// against the active scope and tracking it for later patches.
    pub fn text(&mut self, source: &str) -> Result<NodeId> {
        let scope = self.scopes.active();
        let pieces = split_template(
            source,
            &self.config.open_delimiter,
            &self.config.close_delimiter,
        )?;
        let mut parts = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                Piece::Literal(text) => parts.push(Part::Literal(text.to_owned())),
                Piece::Placeholder(inner) => {
                    let expr = CompiledExpr::compile(inner)?;
                    expr.validate(&self.store, scope)?;
                    let rendered = expr.evaluate(&self.store, scope)?.to_string();
                    parts.push(Part::Slot { expr, rendered });
                }
            }
        }
        let template = TextTemplate { scope, parts };
        let node = self.dom.create_text(&template.rendered());
        if template.has_slots() {
            self.texts.register(node, template);
        }
        Ok(node)
    }

    /// Register a conditional block and return the branch node that is
    /// active now. Attach that node; the engine swaps it in place later.
    pub fn when(
        &mut self,
        condition: &str,
        on_true: impl Into<Branch>,
        on_false: impl Into<Branch>,
    ) -> Result<NodeId> {
        let scope = self.scopes.active();
        let expr = CompiledExpr::compile(condition)?;
        expr.validate(&self.store, scope)?;
        let value = expr.evaluate(&self.store, scope)?.is_truthy();
        let true_node = self.branch_node(on_true.into())?;
        let false_node = self.branch_node(on_false.into())?;
        trace!(%scope, expr = expr.source(), value, "conditional registered");
        self.conditionals.register(
            CondBlock {
                expr,
                scope,
                true_node,
                false_node,
            },
            value,
        );
        Ok(if value { true_node } else { false_node })
    }

    fn branch_node(&mut self, branch: Branch) -> Result<NodeId> {
        match branch {
            Branch::Node(node) => match self.dom.get(node) {
                None => Err(StructuralError::MissingNode.into()),
                Some(data) if data.is_fragment() => Err(StructuralError::FragmentBranch.into()),
                Some(_) => Ok(node),
            },
            Branch::Text(text) => Ok(self.dom.create_text(&text)),
            Branch::Empty => Ok(self.dom.create_text("")),
        }
    }

    /// Register a list block keyed by position. See [`Engine::map_list_keyed`].
    pub fn map_list<R>(&mut self, source: &str, render: R) -> Result<NodeId>
    where
        R: Fn(&mut Engine, &Value, usize) -> Result<NodeId> + 'static,
    {
        self.list_block(source, None, Rc::new(render))
    }

    /// Register a list block over the list state `source` and return a
    /// fragment holding an anchor comment followed by one node per item.
    ///
    /// `key_of` maps each item to a string or number identity key.
    pub fn map_list_keyed<K, R>(&mut self, source: &str, key_of: K, render: R) -> Result<NodeId>
    where
        K: Fn(&Value, usize) -> Value + 'static,
        R: Fn(&mut Engine, &Value, usize) -> Result<NodeId> + 'static,
    {
        self.list_block(source, Some(Rc::new(key_of)), Rc::new(render))
    }

    fn list_block(
        &mut self,
        source: &str,
        key_of: Option<KeyFn>,
        render: RenderFn,
    ) -> Result<NodeId> {
        let source = source.trim();
        let scope = self.scopes.active();
        let key = StateKey::resolve(scope, source);
        let value = self.store.get(key.scope, &key.name)?.clone();
        let items = value
            .as_list()
            .ok_or_else(|| StructuralError::NotAList(source.to_owned()))?;

        let fragment = self.dom.create_fragment();
        let anchor = self.dom.create_comment(source);
        self.dom.append_child(fragment, anchor);
        let mut first = None;
        for (index, item) in items.iter().enumerate() {
            extract_key(key_of.as_ref(), item, index)?;
            let node = self.render_item(scope, &render, item, index)?;
            first.get_or_insert(node);
            self.dom.append_child(fragment, node);
        }

        debug!(%scope, source, items = items.len(), "list block registered");
        self.lists.register(
            key,
            ListBlock {
                source: source.to_owned(),
                scope,
                render,
                key_of,
                first,
                parent: None,
                anchor,
            },
        );
        Ok(fragment)
    }

    fn render_item(
        &mut self,
        scope: ScopeId,
        render: &RenderFn,
        item: &Value,
        index: usize,
    ) -> Result<NodeId> {
        let node = self.with_scope(scope, |engine| render(engine, item, index))?;
        if self.dom.get(node).is_some_and(NodeData::is_fragment) {
            return Err(StructuralError::FragmentItem.into());
        }
        Ok(node)
    }

    fn reconcile_list(&mut self, id: ListId, key: &StateKey, old: &Value) -> Result<()> {
        let Some(block) = self.lists.get(id).cloned() else {
            return Ok(());
        };
        let new = self.store.get(key.scope, &key.name)?.clone();
        let not_a_list = || StructuralError::NotAList(block.source.clone());
        let old_items = old.as_list().ok_or_else(not_a_list)?;
        let new_items = new.as_list().ok_or_else(not_a_list)?;

        let parent = resolve_parent(&self.dom, &block)
            .ok_or_else(|| StructuralError::NoParent(block.source.clone()))?;
        let (start, window) = old_window(&self.dom, parent, &block, old_items.len());
        let plan = plan(old_items, &window, new_items, block.key_of.as_ref())?;

        let mut placements = Vec::with_capacity(plan.steps.len());
        for (index, (step, item)) in plan.steps.iter().zip(new_items).enumerate() {
            let placement = match *step {
                Step::Reuse(node) => Placement::Keep(node),
                Step::Rerender(old) => Placement::Replace {
                    old,
                    new: self.render_item(block.scope, &block.render, item, index)?,
                },
                Step::Create => {
                    Placement::Insert(self.render_item(block.scope, &block.render, item, index)?)
                }
            };
            placements.push(placement);
        }
        patch(&mut self.dom, parent, start, &placements, &plan.stale);

        debug!(
            source = %block.source,
            items = placements.len(),
            removed = plan.stale.len(),
            rerendered = placements.iter().filter(|p| matches!(p, Placement::Replace { .. })).count(),
            created = placements.iter().filter(|p| matches!(p, Placement::Insert(_))).count(),
            "list reconciled"
        );
        if let Some(block) = self.lists.get_mut(id) {
            block.first = placements.first().map(|p| p.node());
            block.parent = Some(parent);
        }
        Ok(())
    }

    // ── Effects ──────────────────────────────────────────────────────

    /// Register `callback` to run after value-changing writes to each of
    /// `options.depends_on`, resolved against the active scope.
    pub fn effect<F>(&mut self, callback: F, options: EffectOptions) -> Result<EffectId>
    where
        F: Fn(&mut Engine) -> Result<()> + 'static,
    {
        let scope = self.scopes.active();
        let mut deps = Vec::with_capacity(options.depends_on.len());
        for name in &options.depends_on {
            let key = StateKey::resolve(scope, name.trim());
            self.store.get(key.scope, &key.name)?;
            deps.push(key);
        }

        let callback: EffectFn = Rc::new(callback);
        let id = self.effects.register(scope, &deps, Rc::clone(&callback));
        if options.run_on_init {
            callback(self)?;
        }
        if options.defer_until_ready {
            if self.effects.is_host_ready() {
                callback(self)?;
            } else {
                self.effects.defer(id);
            }
        }
        Ok(id)
    }

    /// Signal that the host has finished its first render. Runs deferred
    /// effects once; later calls do nothing.
    pub fn host_ready(&mut self) -> Result<()> {
        if self.effects.is_host_ready() {
            return Ok(());
        }
        let waiting = self.effects.take_ready();
        debug!(effects = waiting.len(), "host ready");
        for effect in waiting {
            effect(self)?;
        }
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Attach `handler` for `event` on `node`.
    pub fn on<F>(&mut self, node: NodeId, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&mut Engine, &Event) -> Result<()> + 'static,
    {
        let owner = self.scopes.active();
        let handler: HandlerFn = Rc::new(handler);
        self.events.register(node, event, owner, handler)
    }

    /// Deliver `event` to its target and then each ancestor. Handlers run in
    /// their owner scope. Returns the number of handlers invoked.
    pub fn dispatch(&mut self, event: Event) -> Result<usize> {
        let mut delivered = 0;
        for node in EventHandlers::bubble_path(&self.dom, event.target) {
            for (owner, handler) in self.events.handlers_for(node, &event.name) {
                self.with_scope(owner, |engine| handler(engine, &event))?;
                delivered += 1;
            }
        }
        trace!(event = %event.name, delivered, "event dispatched");
        Ok(delivered)
    }
}

// ---------------------------------------------------------------------------
// Setter
// ---------------------------------------------------------------------------

impl Setter {
    /// Replace the value. Returns whether it changed.
    pub fn set(&self, engine: &mut Engine, value: impl Into<Value>) -> Result<bool> {
        engine.write(self, value.into())
    }

    /// Replace the value with a function of the current one.
    pub fn update(&self, engine: &mut Engine, f: impl FnOnce(&Value) -> Value) -> Result<bool> {
        let next = f(engine.store.get(self.scope, &self.name)?);
        engine.write(self, next)
    }

    /// Current value of the bound slot.
    pub fn get<'e>(&self, engine: &'e Engine) -> Result<&'e Value> {
        Ok(engine.store.get(self.scope, &self.name)?)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
