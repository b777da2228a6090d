//! Node arena: slotmap-backed tree of elements, text, comments and fragments.

pub mod host;
pub mod node;
pub mod tree;

pub use host::NodeSequence;
pub use node::{NodeData, NodeId, NodeKind};
pub use tree::Dom;
