//! App: root render pass, navigation and the async run loop.
//!
//! [`App`] owns an [`Engine`], a [`Router`] and a [`History`]. Every
//! navigation resolves the route first, then tears down all component scopes
//! and renders the new page under the root node. Global state survives.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dom::NodeId;
use crate::engine::{Engine, EngineConfig};
use crate::error::Result;
use crate::router::{History, Router};

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Optional app title.
    pub title: Option<String>,
    /// Path rendered on start.
    pub initial_path: String,
    /// Route rendered for unknown paths.
    pub fallback_route: Option<String>,
    /// Route a denying guard redirects to.
    pub denied_redirect: Option<String>,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: None,
            initial_path: "/".into(),
            fallback_route: None,
            denied_redirect: None,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title (builder).
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the start path (builder).
    pub fn with_initial_path(mut self, path: impl Into<String>) -> Self {
        self.initial_path = path.into();
        self
    }

    /// Set the fallback route (builder).
    pub fn with_fallback_route(mut self, path: impl Into<String>) -> Self {
        self.fallback_route = Some(path.into());
        self
    }

    /// Set the redirect for denied routes (builder).
    pub fn with_denied_redirect(mut self, path: impl Into<String>) -> Self {
        self.denied_redirect = Some(path.into());
        self
    }

    /// Set the engine config (builder).
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

// ---------------------------------------------------------------------------
// NavEvent
// ---------------------------------------------------------------------------

/// Navigation requests delivered to [`App::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Push(String),
    Back,
    Forward,
    Quit,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// The application: engine, routes and history.
pub struct App {
    pub engine: Engine,
    router: Router,
    history: History,
    root: NodeId,
    config: AppConfig,
    renders: usize,
}

impl App {
    /// Create an app. Nothing is rendered until [`App::start`].
    pub fn new(config: AppConfig, router: Router) -> Self {
        let mut engine = Engine::with_config(config.engine.clone());
        let root = engine.element("main");
        engine.dom_mut().set_root(root);
        let router = router
            .with_fallback(config.fallback_route.clone())
            .with_denied_redirect(config.denied_redirect.clone());
        Self {
            engine,
            router,
            history: History::new(config.initial_path.clone()),
            root,
            config,
            renders: 0,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Path of the page currently shown.
    pub fn current_path(&self) -> &str {
        self.history.current()
    }

    /// Number of completed root renders.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Render the initial path and signal host readiness.
    pub fn start(&mut self) -> Result<()> {
        info!(title = ?self.config.title, path = %self.history.current(), "app starting");
        self.render()?;
        self.engine.host_ready()
    }

    /// Render the current history entry from scratch.
    pub fn render(&mut self) -> Result<()> {
        let requested = self.history.current().to_owned();
        let resolved = self.router.resolve(&self.engine, &requested)?;

        self.engine.teardown_components();
        self.engine.dom_mut().clear_children(self.root);
        self.engine.begin_render();
        let component = resolved.component;
        let page = self.engine.component(|engine| component(engine))?;
        self.engine.append(self.root, page);

        if resolved.path != requested {
            self.history.replace(resolved.path.clone());
        }
        self.renders += 1;
        debug!(requested = %requested, shown = %resolved.path, "page rendered");
        Ok(())
    }

    /// Push `path` and render it.
    pub fn navigate(&mut self, path: &str) -> Result<()> {
        self.history.push(path);
        self.render()
    }

    /// Go back one entry. Returns `false` when already at the start.
    pub fn back(&mut self) -> Result<bool> {
        if self.history.back().is_none() {
            return Ok(false);
        }
        self.render()?;
        Ok(true)
    }

    /// Go forward one entry. Returns `false` when already at the end.
    pub fn forward(&mut self) -> Result<bool> {
        if self.history.forward().is_none() {
            return Ok(false);
        }
        self.render()?;
        Ok(true)
    }

    /// Start, then apply navigation events until `Quit` or the channel closes.
    pub async fn run(&mut self, events: &mut mpsc::UnboundedReceiver<NavEvent>) -> Result<()> {
        self.start()?;
        while let Some(event) = events.recv().await {
            debug!(?event, "navigation event");
            match event {
                NavEvent::Push(path) => self.navigate(&path)?,
                NavEvent::Back => {
                    self.back()?;
                }
                NavEvent::Forward => {
                    self.forward()?;
                }
                NavEvent::Quit => break,
            }
        }
        info!(renders = self.renders, "app stopped");
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
