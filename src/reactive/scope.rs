//! Scope manager: one scope per component activation plus the global scope.
//!
//! The stack is only meaningful while a tree is being built. Its top is the
//! active scope; with nothing pushed, the active scope is [`ScopeId::Global`].

use std::fmt;

use crate::error::ScopeError;

/// Identifies a state scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeId {
    /// The single process-wide scope. Survives navigation.
    Global,
    /// One component activation. Discarded on teardown.
    Component(u64),
}

impl ScopeId {
    pub fn is_global(self) -> bool {
        matches!(self, ScopeId::Global)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeId::Global => f.write_str("global"),
            ScopeId::Component(n) => write!(f, "scope-{n}"),
        }
    }
}

/// Stack of active scopes during tree construction.
#[derive(Debug, Default)]
pub struct ScopeStack {
    stack: Vec<ScopeId>,
    next_id: u64,
    render_started: bool,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the root render pass as started. Component scopes can only be
    /// entered after this.
    pub fn begin_render(&mut self) {
        self.render_started = true;
    }

    /// Push a fresh component scope and return its id.
    pub fn enter_component(&mut self) -> Result<ScopeId, ScopeError> {
        if !self.render_started {
            return Err(ScopeError::RenderNotStarted);
        }
        self.next_id += 1;
        let id = ScopeId::Component(self.next_id);
        self.stack.push(id);
        Ok(id)
    }

    /// Re-activate an existing scope, e.g. while re-rendering a list item
    /// that belongs to it.
    pub fn push(&mut self, scope: ScopeId) {
        self.stack.push(scope);
    }

    pub fn exit(&mut self) -> Result<ScopeId, ScopeError> {
        self.stack.pop().ok_or(ScopeError::Underflow)
    }

    /// Top of the stack, or the global scope when empty.
    pub fn active(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId::Global)
    }

    /// Drop every pushed scope, keeping the id counter so ids stay unique.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_defaults_to_global() {
        let scopes = ScopeStack::new();
        assert_eq!(scopes.active(), ScopeId::Global);
    }

    #[test]
    fn enter_requires_render() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.enter_component(), Err(ScopeError::RenderNotStarted));
    }

    #[test]
    fn nested_scopes_are_unique() {
        let mut scopes = ScopeStack::new();
        scopes.begin_render();
        let a = scopes.enter_component().unwrap();
        let b = scopes.enter_component().unwrap();
        assert_ne!(a, b);
        assert_eq!(scopes.active(), b);
        assert_eq!(scopes.exit(), Ok(b));
        assert_eq!(scopes.active(), a);
        assert_eq!(scopes.exit(), Ok(a));
        assert_eq!(scopes.active(), ScopeId::Global);
        assert_eq!(scopes.exit(), Err(ScopeError::Underflow));
    }

    #[test]
    fn ids_survive_clear() {
        let mut scopes = ScopeStack::new();
        scopes.begin_render();
        let a = scopes.enter_component().unwrap();
        scopes.clear();
        let b = scopes.enter_component().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn display() {
        assert_eq!(ScopeId::Global.to_string(), "global");
        assert_eq!(ScopeId::Component(4).to_string(), "scope-4");
    }
}
