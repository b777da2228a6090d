//! Error types for every fallible engine call.
//!
//! Each subsystem has its own enum; [`Error`] wraps them so callers can use a
//! single `?` chain. None of these are transient: they all signal a contract
//! violation at the call site and are never retried internally.

use crate::reactive::value::Value;

/// Invalid state declarations and reads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    #[error("state name must not be empty")]
    EmptyName,
    #[error("invalid state name `{0}`: must match [A-Za-z_][A-Za-z0-9_$]*")]
    InvalidName(String),
    #[error("state name `{0}` is a reserved keyword")]
    ReservedName(String),
    #[error("state name `{0}` must not start with the global sigil `$`")]
    SigilName(String),
    #[error("state `{name}` is already declared in scope {scope}")]
    Duplicate { name: String, scope: String },
    #[error("state `{0}` declared outside of a component; use global state instead")]
    OutsideComponent(String),
    #[error("state `{name}` is not declared in scope {scope}")]
    NotDeclared { name: String, scope: String },
}

/// Invalid or failing state expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("assignment is not allowed in expression `{0}`")]
    Assignment(String),
    #[error("reserved identifier `{ident}` in expression `{expr}`")]
    Reserved { ident: String, expr: String },
    #[error("`{ident}` is not a declared state in expression `{expr}`")]
    Undeclared { ident: String, expr: String },
    #[error("syntax error at offset {offset} in `{expr}`: {message}")]
    Syntax {
        offset: usize,
        message: String,
        expr: String,
    },
    #[error("evaluation of `{expr}` failed: {message}")]
    Eval { message: String, expr: String },
    #[error("unterminated placeholder in `{0}`")]
    UnterminatedPlaceholder(String),
    #[error("placeholder delimiters must not be empty")]
    EmptyDelimiter,
}

/// Violations of the node-structure contracts of conditional and list blocks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("a conditional branch must be a single node, not a fragment")]
    FragmentBranch,
    #[error("a list item must render to a single node, not a fragment")]
    FragmentItem,
    #[error("list key at index {index} must be a string or number, got {value}")]
    InvalidKey { index: usize, value: Value },
    #[error("list block bound to `{0}` has no resolvable parent node")]
    NoParent(String),
    #[error("list block bound to `{0}` requires a list value")]
    NotAList(String),
    #[error("node does not exist in the tree")]
    MissingNode,
}

/// Misuse of the scope stack.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScopeError {
    #[error("component scope entered before the root render started")]
    RenderNotStarted,
    #[error("scope stack is empty")]
    Underflow,
}

/// Navigation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    #[error("no route matches `{0}` and no fallback route is registered")]
    NotFound(String),
    #[error("access to `{0}` denied and no redirect is configured")]
    Denied(String),
    #[error("redirect loop while resolving `{0}`")]
    RedirectLoop(String),
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
