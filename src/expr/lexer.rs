//! logos-based expression tokenizer.
//!
//! Longest match wins, so `===` beats `==` beats `=`, and `$user` lexes as a
//! single [`Token::GlobalIdent`]. Assignment-shaped operators are real tokens
//! so the parser can reject them by name instead of reporting a generic
//! syntax error.

use logos::Logos;

/// Expression token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // ── Literals and names ───────────────────────────────────────────

    /// Integer or decimal number, with optional exponent.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    /// String literal in single, double, or backtick quotes. Escapes are
    /// limited to `\\` followed by any character.
    #[regex(r#""([^"\\]|\\.)*""#, unquote)]
    #[regex(r"'([^'\\]|\\.)*'", unquote)]
    #[regex(r"`([^`\\]|\\.)*`", unquote)]
    Str(String),

    /// Global state reference: `$user`.
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_$]*", |lex| lex.slice()[1..].to_owned())]
    GlobalIdent(String),

    /// Identifier: local state names, literal keywords, property names.
    #[regex(r"[A-Za-z_][A-Za-z0-9_$]*", |lex| lex.slice().to_owned())]
    Ident(String),

    // ── Assignment-shaped operators (always rejected) ────────────────

    #[token("=")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("++")]
    #[token("--")]
    Assign,

    // ── Operators ────────────────────────────────────────────────────

    #[token("===")]
    #[token("==")]
    Eq,
    #[token("!==")]
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
}

fn unquote(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize `input`. Returns the offset of the first unrecognized character
/// on failure.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, usize> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let offset = lexer.span().start;
        match result {
            Ok(token) => tokens.push(Spanned { token, offset }),
            Err(()) => return Err(offset),
        }
    }
    Ok(tokens)
}
