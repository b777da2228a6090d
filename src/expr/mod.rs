//! State expressions: lexer, parser, validation and evaluation.
//!
//! Expressions are short snippets such as `count > 0 && show` or
//! `$user.name`. Bare names read state in the expression's scope;
//! `$`-prefixed names read global state.
//!
//! - [`lexer`] — logos tokenizer.
//! - [`parser`] — recursive descent parser to an [`Expr`] tree.
//! - [`eval`] — tree-walking evaluator.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{evaluate, Env, EvalFailure};
pub use parser::{parse, BinaryOp, Expr, UnaryOp};

use crate::error::ExprError;
use crate::reactive::scope::ScopeId;
use crate::reactive::store::{StateKey, StateStore};
use crate::reactive::value::Value;

/// Prefix that redirects a state reference to the global scope.
pub const GLOBAL_SIGIL: char = '$';

/// Keywords and unsafe globals that can never name state or appear in an
/// expression.
const RESERVED: &[&str] = &[
    // Language keywords.
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
    // Unsafe globals.
    "eval", "Function", "window", "document", "globalThis", "self", "process", "require",
    "module", "exports", "constructor", "prototype", "__proto__", "arguments", "fetch",
    "setTimeout", "setInterval", "localStorage", "sessionStorage", "location", "history",
];

/// Whether `ident` is a reserved keyword or unsafe global.
pub fn is_reserved(ident: &str) -> bool {
    RESERVED.contains(&ident)
}

/// A state reference found in an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Local(String),
    Global(String),
}

impl Reference {
    /// The state slot this reference reads when evaluated from `scope`.
    pub fn key(&self, scope: ScopeId) -> StateKey {
        match self {
            Reference::Local(name) => StateKey::new(scope, name.as_str()),
            Reference::Global(name) => StateKey::new(ScopeId::Global, name.as_str()),
        }
    }
}

/// A parsed expression together with the state it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
    references: Vec<Reference>,
}

impl CompiledExpr {
    /// Parse `source`, rejecting assignments and reserved identifiers.
    pub fn compile(source: &str) -> Result<Self, ExprError> {
        let source = source.trim();
        let ast = parse(source)?;
        let mut references = Vec::new();
        collect_references(&ast, &mut references);
        Ok(Self {
            source: source.to_owned(),
            ast,
            references,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Distinct state references, in order of first appearance.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Dependency keys when evaluated from `scope`.
    pub fn dependencies(&self, scope: ScopeId) -> Vec<StateKey> {
        self.references.iter().map(|r| r.key(scope)).collect()
    }

    /// Check that every reference is declared for `scope`.
    pub fn validate(&self, store: &StateStore, scope: ScopeId) -> Result<(), ExprError> {
        for reference in &self.references {
            let key = reference.key(scope);
            if !store.contains(key.scope, &key.name) {
                let ident = match reference {
                    Reference::Local(name) => name.clone(),
                    Reference::Global(name) => format!("{GLOBAL_SIGIL}{name}"),
                };
                return Err(ExprError::Undeclared {
                    ident,
                    expr: self.source.clone(),
                });
            }
        }
        Ok(())
    }

    /// Evaluate against the current state of `scope` plus global state.
    pub fn evaluate(&self, store: &StateStore, scope: ScopeId) -> Result<Value, ExprError> {
        let env = ScopeEnv { store, scope };
        evaluate(&self.ast, &env).map_err(|failure| match failure {
            EvalFailure::Undeclared(ident) => ExprError::Undeclared {
                ident,
                expr: self.source.clone(),
            },
            EvalFailure::Message(message) => ExprError::Eval {
                message,
                expr: self.source.clone(),
            },
        })
    }
}

fn collect_references(expr: &Expr, out: &mut Vec<Reference>) {
    fn push_unique(out: &mut Vec<Reference>, reference: Reference) {
        if !out.contains(&reference) {
            out.push(reference);
        }
    }

    match expr {
        Expr::Literal(_) => {}
        Expr::Local(name) => push_unique(out, Reference::Local(name.clone())),
        Expr::Global(name) => push_unique(out, Reference::Global(name.clone())),
        Expr::List(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Expr::Member(target, _) | Expr::Unary(_, target) => collect_references(target, out),
        Expr::Index(lhs, rhs) | Expr::Binary(lhs, _, rhs) => {
            collect_references(lhs, out);
            collect_references(rhs, out);
        }
        Expr::Conditional(cond, then, otherwise) => {
            collect_references(cond, out);
            collect_references(then, out);
            collect_references(otherwise, out);
        }
    }
}

/// Evaluation environment over one scope of a [`StateStore`].
struct ScopeEnv<'a> {
    store: &'a StateStore,
    scope: ScopeId,
}

impl Env for ScopeEnv<'_> {
    fn local(&self, name: &str) -> Option<&Value> {
        self.store.get(self.scope, name).ok()
    }

    fn global(&self, name: &str) -> Option<&Value> {
        self.store.get(ScopeId::Global, name).ok()
    }
}
