//! Route table and navigation history.
//!
//! A [`Router`] maps paths to component functions. A route may be protected
//! by a guard that reads engine state; a denied route redirects to the
//! configured path. Unknown paths fall back to the fallback route when one is
//! registered.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::{Result, RoutingError};

/// Builds the page for a route. Runs inside a fresh component scope.
pub type ComponentFn = Rc<dyn Fn(&mut Engine) -> Result<NodeId>>;

/// Decides whether a protected route may be shown.
pub type GuardFn = Rc<dyn Fn(&Engine) -> bool>;

#[derive(Clone)]
pub struct Route {
    pub path: String,
    pub component: ComponentFn,
    pub guard: Option<GuardFn>,
}

/// A successful resolution: the path actually shown and its component.
#[derive(Clone)]
pub struct Resolved {
    pub path: String,
    pub component: ComponentFn,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, Route>,
    fallback: Option<String>,
    denied_redirect: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public route (builder).
    pub fn route<F>(mut self, path: &str, component: F) -> Self
    where
        F: Fn(&mut Engine) -> Result<NodeId> + 'static,
    {
        self.insert(path, Rc::new(component), None);
        self
    }

    /// Register a route shown only while `guard` allows it (builder).
    pub fn protected<G, F>(mut self, path: &str, guard: G, component: F) -> Self
    where
        G: Fn(&Engine) -> bool + 'static,
        F: Fn(&mut Engine) -> Result<NodeId> + 'static,
    {
        self.insert(path, Rc::new(component), Some(Rc::new(guard)));
        self
    }

    /// Path rendered for unknown paths (builder).
    pub fn with_fallback(mut self, path: Option<String>) -> Self {
        self.fallback = path;
        self
    }

    /// Path a denied route redirects to (builder).
    pub fn with_denied_redirect(mut self, path: Option<String>) -> Self {
        self.denied_redirect = path;
        self
    }

    fn insert(&mut self, path: &str, component: ComponentFn, guard: Option<GuardFn>) {
        self.routes.insert(
            path.to_owned(),
            Route {
                path: path.to_owned(),
                component,
                guard,
            },
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve `path` to the route that should be rendered, following the
    /// fallback and denied redirects.
    pub fn resolve(&self, engine: &Engine, path: &str) -> Result<Resolved, RoutingError> {
        let mut current = path.to_owned();
        // An acyclic chain visits each route once plus at most two unknown paths.
        for _ in 0..self.routes.len() + 2 {
            let Some(route) = self.routes.get(&current) else {
                match &self.fallback {
                    Some(fallback) if *fallback != current && self.contains(fallback) => {
                        debug!(path = %current, %fallback, "unknown path; using fallback route");
                        current = fallback.clone();
                        continue;
                    }
                    _ => return Err(RoutingError::NotFound(current)),
                }
            };
            if route.guard.as_ref().is_some_and(|guard| !guard(engine)) {
                match &self.denied_redirect {
                    Some(redirect) if *redirect != current => {
                        debug!(path = %current, %redirect, "route denied; redirecting");
                        current = redirect.clone();
                        continue;
                    }
                    _ => return Err(RoutingError::Denied(current)),
                }
            }
            return Ok(Resolved {
                path: current,
                component: Rc::clone(&route.component),
            });
        }
        Err(RoutingError::RedirectLoop(path.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Linear navigation history with a cursor, like a browser session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    cursor: usize,
}

impl History {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    /// Push a new entry, dropping any forward entries.
    pub fn push(&mut self, path: impl Into<String>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(path.into());
        self.cursor += 1;
    }

    /// Overwrite the current entry, e.g. after a redirect.
    pub fn replace(&mut self, path: impl Into<String>) {
        self.entries[self.cursor] = path.into();
    }

    /// Step back. Returns the new current path, or `None` at the start.
    pub fn back(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    /// Step forward. Returns the new current path, or `None` at the end.
    pub fn forward(&mut self) -> Option<&str> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
