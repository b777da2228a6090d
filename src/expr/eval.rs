//! Tree-walking evaluator.
//!
//! Evaluates an [`Expr`] against an [`Env`] that only exposes state values.
//! Nothing else is reachable from an expression.

use std::cmp::Ordering;

use crate::expr::parser::{BinaryOp, Expr, UnaryOp};
use crate::reactive::value::Value;

/// Variable lookup for evaluation.
pub trait Env {
    fn local(&self, name: &str) -> Option<&Value>;
    fn global(&self, name: &str) -> Option<&Value>;
}

/// Why an evaluation failed.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalFailure {
    /// A referenced state does not exist (`$`-prefixed for globals).
    Undeclared(String),
    /// A runtime type error or similar.
    Message(String),
}

fn fail<T>(message: impl Into<String>) -> Result<T, EvalFailure> {
    Err(EvalFailure::Message(message.into()))
}

pub fn evaluate(expr: &Expr, env: &dyn Env) -> Result<Value, EvalFailure> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Local(name) => env
            .local(name)
            .cloned()
            .ok_or_else(|| EvalFailure::Undeclared(name.clone())),
        Expr::Global(name) => env
            .global(name)
            .cloned()
            .ok_or_else(|| EvalFailure::Undeclared(format!("${name}"))),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Member(target, field) => member(&evaluate(target, env)?, field),
        Expr::Index(target, index) => {
            let target = evaluate(target, env)?;
            let index = evaluate(index, env)?;
            match (&target, &index) {
                (Value::List(items), Value::Number(n)) => {
                    if n.fract() == 0.0 && *n >= 0.0 {
                        Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
                    } else {
                        Ok(Value::Null)
                    }
                }
                (_, Value::Str(field)) => member(&target, field),
                (Value::Null, _) => fail(format!("cannot index null with {index}")),
                _ => Ok(Value::Null),
            }
        }
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!evaluate(operand, env)?.is_truthy())),
        Expr::Unary(UnaryOp::Neg, operand) => match evaluate(operand, env)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => fail(format!("cannot negate {}", other.kind())),
        },
        Expr::Binary(lhs, BinaryOp::And, rhs) => {
            let left = evaluate(lhs, env)?;
            if left.is_truthy() {
                evaluate(rhs, env)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(lhs, BinaryOp::Or, rhs) => {
            let left = evaluate(lhs, env)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                evaluate(rhs, env)
            }
        }
        Expr::Binary(lhs, op, rhs) => {
            let left = evaluate(lhs, env)?;
            let right = evaluate(rhs, env)?;
            binary(*op, left, right)
        }
        Expr::Conditional(cond, then, otherwise) => {
            if evaluate(cond, env)?.is_truthy() {
                evaluate(then, env)
            } else {
                evaluate(otherwise, env)
            }
        }
    }
}

fn member(target: &Value, field: &str) -> Result<Value, EvalFailure> {
    match (target, field) {
        (Value::Null, _) => fail(format!("cannot read property `{field}` of null")),
        (Value::List(items), "length") => Ok(Value::from(items.len())),
        (Value::Str(s), "length") => Ok(Value::from(s.chars().count())),
        (Value::Map(entries), _) => Ok(entries.get(field).cloned().unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalFailure> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => {
                    return fail(format!(
                        "cannot compare {} with {}",
                        left.kind(),
                        right.kind()
                    ))
                }
            };
            // NaN compares false in every direction.
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEq => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (left @ Value::Str(_), right) | (left, right @ Value::Str(_)) => {
                Ok(Value::Str(format!("{left}{right}")))
            }
            (left, right) => fail(format!("cannot add {} and {}", left.kind(), right.kind())),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                return fail(format!(
                    "arithmetic on {} and {}",
                    left.kind(),
                    right.kind()
                ));
            };
            let n = match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(Value::Number(n))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators are handled in evaluate"),
    }
}
