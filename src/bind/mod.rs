//! The three tracked binding kinds: interpolated text, conditional blocks
//! and keyed lists.

pub mod conditional;
pub mod list;
pub mod text;

pub use conditional::{Branch, CondBlock, CondId, Conditionals};
pub use list::{KeyFn, ListBlock, ListBlocks, ListId, ListKey, RenderFn};
pub use text::{split_template, Part, Piece, TextBindings, TextTemplate};
