//! Effect registry: callbacks that run after specific state changes.
//!
//! Unlike auto-tracking effects, dependencies are declared up front by name.
//! An effect registered under several names runs once per value-changing
//! write to any of them, after every binding and block for that write has
//! been patched.

use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::engine::Engine;
use crate::error::Result;
use crate::reactive::scope::ScopeId;
use crate::reactive::store::StateKey;

new_key_type! {
    /// Identifies a registered effect.
    pub struct EffectId;
}

/// An effect callback. It receives the engine so it can read state or call
/// other setters; such re-entrant writes run synchronously.
pub type EffectFn = Rc<dyn Fn(&mut Engine) -> Result<()>>;

/// Registration options for [`Engine::effect`].
#[derive(Debug, Clone, Default)]
pub struct EffectOptions {
    /// State names (or `$global` names) whose changes trigger the effect.
    pub depends_on: Vec<String>,
    /// Run once immediately on registration.
    pub run_on_init: bool,
    /// Run once after the host signals readiness (immediately if it already has).
    pub defer_until_ready: bool,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency (builder).
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Set whether the effect runs on registration (builder).
    pub fn run_on_init(mut self, run: bool) -> Self {
        self.run_on_init = run;
        self
    }

    /// Set whether the effect runs once after the host is ready (builder).
    pub fn defer_until_ready(mut self, defer: bool) -> Self {
        self.defer_until_ready = defer;
        self
    }
}

struct EffectRecord {
    callback: EffectFn,
    owner: ScopeId,
}

/// Dependency-keyed effect storage.
#[derive(Default)]
pub struct EffectRegistry {
    effects: SlotMap<EffectId, EffectRecord>,
    by_state: HashMap<StateKey, Vec<EffectId>>,
    awaiting_ready: Vec<EffectId>,
    host_ready: bool,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `callback` under each dependency key, preserving registration order.
    pub fn register(&mut self, owner: ScopeId, deps: &[StateKey], callback: EffectFn) -> EffectId {
        let id = self.effects.insert(EffectRecord { callback, owner });
        for key in deps {
            let ids = self.by_state.entry(key.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        id
    }

    pub fn callback(&self, id: EffectId) -> Option<EffectFn> {
        self.effects.get(id).map(|record| Rc::clone(&record.callback))
    }

    /// Callbacks registered under `key`, in registration order.
    pub fn dependents(&self, key: &StateKey) -> Vec<EffectFn> {
        self.by_state
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|&id| self.callback(id))
            .collect()
    }

    pub fn is_host_ready(&self) -> bool {
        self.host_ready
    }

    /// Queue an effect for the host-ready signal.
    pub fn defer(&mut self, id: EffectId) {
        self.awaiting_ready.push(id);
    }

    /// Mark the host ready and return the callbacks that were waiting for it.
    pub fn take_ready(&mut self) -> Vec<EffectFn> {
        self.host_ready = true;
        let waiting = std::mem::take(&mut self.awaiting_ready);
        waiting
            .into_iter()
            .filter_map(|id| self.callback(id))
            .collect()
    }

    /// Forget every effect owned by a component scope.
    pub fn drop_components(&mut self) {
        self.effects.retain(|_, record| record.owner.is_global());
        let effects = &self.effects;
        self.by_state.retain(|_, ids| {
            ids.retain(|id| effects.contains_key(*id));
            !ids.is_empty()
        });
        self.awaiting_ready.retain(|id| effects.contains_key(*id));
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn noop() -> EffectFn {
        Rc::new(|_: &mut Engine| Ok(()))
    }

    #[test]
    fn dependents_in_registration_order() {
        let mut reg = EffectRegistry::new();
        let key = StateKey::new(ScopeId::Global, "count");
        let order = Rc::new(Cell::new(0));

        let o1 = Rc::clone(&order);
        let first: EffectFn = Rc::new(move |_: &mut Engine| {
            o1.set(o1.get() * 10 + 1);
            Ok(())
        });
        let o2 = Rc::clone(&order);
        let second: EffectFn = Rc::new(move |_: &mut Engine| {
            o2.set(o2.get() * 10 + 2);
            Ok(())
        });
        reg.register(ScopeId::Global, std::slice::from_ref(&key), first);
        reg.register(ScopeId::Global, std::slice::from_ref(&key), second);

        let mut engine = Engine::new();
        for cb in reg.dependents(&key) {
            cb(&mut engine).unwrap();
        }
        assert_eq!(order.get(), 12);
    }

    #[test]
    fn duplicate_dependency_registers_once() {
        let mut reg = EffectRegistry::new();
        let key = StateKey::new(ScopeId::Global, "a");
        reg.register(ScopeId::Global, &[key.clone(), key.clone()], noop());
        assert_eq!(reg.dependents(&key).len(), 1);
    }

    #[test]
    fn unrelated_key_has_no_dependents() {
        let mut reg = EffectRegistry::new();
        reg.register(ScopeId::Global, &[StateKey::new(ScopeId::Global, "a")], noop());
        assert!(reg
            .dependents(&StateKey::new(ScopeId::Global, "b"))
            .is_empty());
    }

    #[test]
    fn take_ready_drains_once() {
        let mut reg = EffectRegistry::new();
        let id = reg.register(ScopeId::Global, &[], noop());
        reg.defer(id);
        assert!(!reg.is_host_ready());
        assert_eq!(reg.take_ready().len(), 1);
        assert!(reg.is_host_ready());
        assert!(reg.take_ready().is_empty());
    }

    #[test]
    fn drop_components_keeps_global_effects() {
        let mut reg = EffectRegistry::new();
        let key = StateKey::new(ScopeId::Global, "user");
        reg.register(ScopeId::Global, std::slice::from_ref(&key), noop());
        reg.register(ScopeId::Component(1), std::slice::from_ref(&key), noop());
        assert_eq!(reg.dependents(&key).len(), 2);
        reg.drop_components();
        assert_eq!(reg.dependents(&key).len(), 1);
        assert_eq!(reg.len(), 1);
    }
}
