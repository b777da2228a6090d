//! Recursive descent expression parser.
//!
//! Produces an [`Expr`] tree from the tokens of [`crate::expr::lexer`]. The
//! grammar is closed: there are no calls, no assignment and no statements, so
//! a parsed expression can only read state.

use crate::error::ExprError;
use crate::expr::is_reserved;
use crate::expr::lexer::{tokenize, Spanned, Token};
use crate::reactive::value::Value;

/// Deepest allowed nesting of sub-expressions and unary operators.
const MAX_DEPTH: usize = 64;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// State in the scope the expression is evaluated against.
    Local(String),
    /// `$name`: state in the global scope.
    Global(String),
    List(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parse `source` into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source).map_err(|offset| ExprError::Syntax {
        offset,
        message: "unrecognized character".into(),
        expr: source.to_owned(),
    })?;

    if tokens.iter().any(|t| t.token == Token::Assign) {
        return Err(ExprError::Assignment(source.to_owned()));
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
        source,
    };
    let expr = parser.parse_conditional()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error_at(extra.offset, format!("unexpected {:?}", extra.token)));
    }
    Ok(expr)
}

struct Parser<'s> {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
    source: &'s str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    /// Consume the next token if it equals `expected`.
    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        match self.advance() {
            Some(tok) if &tok.token == expected => Ok(()),
            Some(tok) => Err(self.error_at(
                tok.offset,
                format!("expected {:?}, got {:?}", expected, tok.token),
            )),
            None => Err(self.error_at(self.source.len(), format!("expected {:?}", expected))),
        }
    }

    fn error_at(&self, offset: usize, message: String) -> ExprError {
        ExprError::Syntax {
            offset,
            message,
            expr: self.source.to_owned(),
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        if self.depth >= MAX_DEPTH {
            let offset = self.peek().map_or(self.source.len(), |t| t.offset);
            return Err(self.error_at(offset, "expression is nested too deeply".into()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        self.nested(Self::parse_ternary)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_conditional()?;
        self.expect(&Token::Colon)?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    /// Parse a left-associative chain of binary operators at one precedence level.
    fn parse_chain(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ExprError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ExprError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.peek_token().and_then(op_for) {
            self.cursor += 1;
            let rhs = next(self)?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_and, |t| match t {
            Token::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_equality, |t| match t {
            Token::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_relational, |t| match t {
            Token::Eq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn parse_relational(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_additive, |t| match t {
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEq),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEq),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.parse_chain(Self::parse_unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat(&Token::Not) {
            UnaryOp::Not
        } else if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else {
            return self.parse_postfix();
        };
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Spanned {
                        token: Token::Ident(name),
                        ..
                    }) => expr = Expr::Member(Box::new(expr), name),
                    Some(tok) => {
                        return Err(self.error_at(tok.offset, "expected property name".into()))
                    }
                    None => {
                        return Err(
                            self.error_at(self.source.len(), "expected property name".into())
                        )
                    }
                }
            } else if self.eat(&Token::BracketOpen) {
                let index = self.parse_conditional()?;
                self.expect(&Token::BracketClose)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if let Some(call) = self.peek().filter(|t| t.token == Token::ParenOpen) {
                return Err(self.error_at(call.offset, "function calls are not allowed".into()));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let Some(tok) = self.advance() else {
            return Err(self.error_at(self.source.len(), "unexpected end of expression".into()));
        };
        match tok.token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) => {
                let literal = match name.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = literal {
                    return Ok(Expr::Literal(value));
                }
                if is_reserved(&name) {
                    return Err(ExprError::Reserved {
                        ident: name,
                        expr: self.source.to_owned(),
                    });
                }
                Ok(Expr::Local(name))
            }
            Token::GlobalIdent(name) => {
                if is_reserved(&name) {
                    Err(ExprError::Reserved {
                        ident: format!("${name}"),
                        expr: self.source.to_owned(),
                    })
                } else {
                    Ok(Expr::Global(name))
                }
            }
            Token::ParenOpen => {
                let inner = self.parse_conditional()?;
                self.expect(&Token::ParenClose)?;
                Ok(inner)
            }
            Token::BracketOpen => {
                let mut items = Vec::new();
                if !self.eat(&Token::BracketClose) {
                    loop {
                        items.push(self.parse_conditional()?);
                        if self.eat(&Token::BracketClose) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(self.error_at(tok.offset, format!("unexpected {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn local(name: &str) -> Box<Expr> {
        Box::new(Expr::Local(name.into()))
    }

    #[test]
    fn precedence_and_over_or() {
        assert_eq!(
            parse("a || b && c").unwrap(),
            Expr::Binary(
                local("a"),
                BinaryOp::Or,
                Box::new(Expr::Binary(local("b"), BinaryOp::And, local("c")))
            )
        );
    }

    #[test]
    fn comparison_binds_tighter_than_logic() {
        assert_eq!(
            parse("count > 0 && show").unwrap(),
            Expr::Binary(
                Box::new(Expr::Binary(
                    local("count"),
                    BinaryOp::Greater,
                    Box::new(Expr::Literal(Value::Number(0.0)))
                )),
                BinaryOp::And,
                local("show")
            )
        );
    }

    #[test]
    fn member_names_are_not_references() {
        assert_eq!(
            parse("$user.name").unwrap(),
            Expr::Member(Box::new(Expr::Global("user".into())), "name".into())
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Conditional(_, _, otherwise) = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn literals() {
        assert_eq!(parse("null").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(parse("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(
            parse("[1, 'a']").unwrap(),
            Expr::List(vec![
                Expr::Literal(Value::Number(1.0)),
                Expr::Literal(Value::Str("a".into()))
            ])
        );
    }

    #[test]
    fn rejects_assignment() {
        assert_eq!(
            parse("count = 5"),
            Err(ExprError::Assignment("count = 5".into()))
        );
        assert!(matches!(parse("x++"), Err(ExprError::Assignment(_))));
    }

    #[test]
    fn assignment_inside_string_is_fine() {
        assert!(parse("label == 'a = b'").is_ok());
    }

    #[test]
    fn rejects_reserved_identifiers() {
        assert!(matches!(
            parse("constructor"),
            Err(ExprError::Reserved { ident, .. }) if ident == "constructor"
        ));
        assert!(matches!(
            parse("window && a"),
            Err(ExprError::Reserved { .. })
        ));
    }

    #[test]
    fn rejects_calls() {
        assert!(matches!(parse("fmt(1)"), Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(parse("a b"), Err(ExprError::Syntax { offset: 2, .. })));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(
            parse(&parens),
            Err(ExprError::Syntax { message, .. }) if message.contains("nested too deeply")
        ));
        let nots = format!("{}a", "!".repeat(100_000));
        assert!(matches!(parse(&nots), Err(ExprError::Syntax { .. })));
        let lists = "[".repeat(100_000);
        assert!(matches!(parse(&lists), Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn moderate_nesting_parses() {
        let depth = MAX_DEPTH / 2;
        let source = format!("{}-!x{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(parse("   "), Err(ExprError::Syntax { .. })));
    }
}
