//! Reactive state: values, scopes, the state store and effects.
//!
//! - [`Value`] — dynamically typed state value with deep equality.
//! - [`ScopeStack`] — tracks the active component scope during construction.
//! - [`StateStore`] — per-scope state, written through [`Setter`] handles.
//! - [`EffectRegistry`] — callbacks keyed by the state they depend on.

pub mod effect;
pub mod scope;
pub mod store;
pub mod value;

pub use effect::{EffectFn, EffectId, EffectOptions, EffectRegistry};
pub use scope::{ScopeId, ScopeStack};
pub use store::{Setter, StateKey, StateStore, StateView};
pub use value::Value;
