//! # strand
//!
//! A minimal reactive UI runtime. Named, scoped state is bound to fragments of
//! a retained node tree, and each state write patches exactly the regions that
//! depend on it. There is no virtual-tree diff pass.
//!
//! ## Core Systems
//!
//! - **[`engine`]** — The explicit context object every call goes through
//! - **[`reactive`]** — Values, scopes, the state store, effects
//! - **[`expr`]** — Restricted expression language: lexer, parser, evaluator
//! - **[`bind`]** — Text interpolation, conditional blocks, keyed lists
//! - **[`dom`]** — Slotmap-backed node arena and the host sequence interface
//! - **[`event`]** — Explicit event wiring with bubbling dispatch
//! - **[`router`]** — Route table, guards, history
//! - **[`app`]** — Root render pass, navigation, async run loop
//!
//! ## Example
//!
//! ```
//! use strand::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! engine.begin_render();
//! let root = engine.element("div");
//! let (count, label) = engine
//!     .component(|e| {
//!         let count = e.use_state("count", 0)?;
//!         let label = e.text("clicked {{ count }} times")?;
//!         Ok((count, label))
//!     })
//!     .unwrap();
//! engine.append(root, label);
//!
//! count.set(&mut engine, 3).unwrap();
//! assert_eq!(engine.dom().inner_markup(root), "clicked 3 times");
//! assert!(!count.set(&mut engine, Value::from(3)).unwrap());
//! ```

// Foundation
pub mod error;
pub mod dom;

// State and expressions
pub mod reactive;
pub mod expr;

// Bindings
pub mod bind;
pub mod engine;
pub mod event;

// Application
pub mod router;
pub mod app;

pub use app::{App, AppConfig, NavEvent};
pub use bind::Branch;
pub use dom::{Dom, NodeId};
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use event::Event;
pub use reactive::{EffectOptions, ScopeId, Setter, Value};
pub use router::{History, Router};
