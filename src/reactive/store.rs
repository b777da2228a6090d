//! Per-scope state storage.
//!
//! [`StateStore`] maps `(scope, name)` to the current [`Value`]. Writes go
//! through a [`Setter`] handle, reads through
//! [`StateView`], which redirects `$name` to the global scope.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::DeclarationError;
use crate::expr::{is_reserved, GLOBAL_SIGIL};
use crate::reactive::scope::ScopeId;
use crate::reactive::value::Value;

/// Check a state name against the naming rules.
///
/// The name must be non-empty after trimming, start with a letter or `_`,
/// continue with word characters or `$`, and not be a reserved keyword.
pub fn validate_name(name: &str) -> Result<(), DeclarationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DeclarationError::EmptyName);
    }
    if trimmed.starts_with(GLOBAL_SIGIL) {
        return Err(DeclarationError::SigilName(trimmed.to_owned()));
    }
    let mut chars = trimmed.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == GLOBAL_SIGIL);
    if !head_ok || !tail_ok || trimmed.len() != name.len() {
        return Err(DeclarationError::InvalidName(name.to_owned()));
    }
    if is_reserved(trimmed) {
        return Err(DeclarationError::ReservedName(trimmed.to_owned()));
    }
    Ok(())
}

/// Split a possibly sigil-prefixed reference into its target scope and bare name.
pub fn resolve_reference(scope: ScopeId, reference: &str) -> (ScopeId, &str) {
    match reference.strip_prefix(GLOBAL_SIGIL) {
        Some(bare) => (ScopeId::Global, bare),
        None => (scope, reference),
    }
}

/// Scope-keyed state values.
#[derive(Debug, Default)]
pub struct StateStore {
    scopes: HashMap<ScopeId, BTreeMap<String, Value>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` in `scope` with an initial value.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        initial: Value,
    ) -> Result<(), DeclarationError> {
        validate_name(name)?;
        let slots = self.scopes.entry(scope).or_default();
        if slots.contains_key(name) {
            return Err(DeclarationError::Duplicate {
                name: name.to_owned(),
                scope: scope.to_string(),
            });
        }
        slots.insert(name.to_owned(), initial);
        Ok(())
    }

    pub fn contains(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes
            .get(&scope)
            .is_some_and(|slots| slots.contains_key(name))
    }

    /// Read a bare (non-sigil) name from exactly `scope`.
    pub fn get(&self, scope: ScopeId, name: &str) -> Result<&Value, DeclarationError> {
        self.scopes
            .get(&scope)
            .and_then(|slots| slots.get(name))
            .ok_or_else(|| DeclarationError::NotDeclared {
                name: name.to_owned(),
                scope: scope.to_string(),
            })
    }

    /// Overwrite a declared value, returning the previous one.
    pub(crate) fn replace(
        &mut self,
        scope: ScopeId,
        name: &str,
        value: Value,
    ) -> Result<Value, DeclarationError> {
        let slot = self
            .scopes
            .get_mut(&scope)
            .and_then(|slots| slots.get_mut(name))
            .ok_or_else(|| DeclarationError::NotDeclared {
                name: name.to_owned(),
                scope: scope.to_string(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    /// A read accessor for `scope`.
    pub fn view(&self, scope: ScopeId) -> StateView<'_> {
        StateView { store: self, scope }
    }

    /// Drop every component scope. Global state is kept.
    pub fn drop_components(&mut self) {
        self.scopes.retain(|scope, _| scope.is_global());
    }

    /// Number of scopes holding at least one declaration.
    pub fn scope_count(&self) -> usize {
        self.scopes.values().filter(|slots| !slots.is_empty()).count()
    }
}

/// Read-only accessor over one scope's state.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    store: &'a StateStore,
    scope: ScopeId,
}

impl<'a> StateView<'a> {
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Read `name`, or `$name` from the global scope.
    pub fn get(&self, name: &str) -> Result<&'a Value, DeclarationError> {
        let (scope, bare) = resolve_reference(self.scope, name);
        self.store.get(scope, bare)
    }
}

/// A `(scope, name)` pair identifying one state slot. Registries key their
/// dependency records by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub scope: ScopeId,
    pub name: String,
}

impl StateKey {
    pub fn new(scope: ScopeId, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }

    /// Resolve a reference made from `scope`, honoring the global sigil.
    pub fn resolve(scope: ScopeId, reference: &str) -> Self {
        let (scope, bare) = resolve_reference(scope, reference);
        Self::new(scope, bare)
    }
}

/// Handle bound to one `(scope, name)` slot. Calling it through the engine
/// writes the slot and patches everything that depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setter {
    pub(crate) scope: ScopeId,
    pub(crate) name: Rc<str>,
}

impl Setter {
    pub(crate) fn new(scope: ScopeId, name: &str) -> Self {
        Self {
            scope,
            name: Rc::from(name),
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> StateKey {
        StateKey::new(self.scope, &*self.name)
    }
}
