//! Tree-walking evaluator for parsed expressions

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::parser::{BinaryOp, Expr};
use super::{ResultType, VariableResolver};

type EvalResult = Result<Value, String>;

pub(super) fn evaluate(expr: &Expr, variables: &dyn VariableResolver) -> EvalResult {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, variables))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Path(segments) => resolve_path(segments, variables),
        Expr::Negate(inner) => match evaluate(inner, variables)? {
            Value::Number(n) => Ok(number(-as_f64(&n))),
            other => Err(format!(
                "expected NUMBER to negate but found {}",
                ResultType::of(&other)
            )),
        },
        Expr::Not(inner) => match evaluate(inner, variables)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Ok(Value::Null),
        },
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, variables)?;
            let right = evaluate(right, variables)?;
            apply(*op, left, right)
        }
    }
}

fn resolve_path(segments: &[String], variables: &dyn VariableResolver) -> EvalResult {
    let (head, members) = segments
        .split_first()
        .ok_or_else(|| "empty variable path".to_string())?;

    let mut value = variables
        .resolve(head)
        .ok_or_else(|| format!("no variable found for name '{}'", head))?;

    for member in members {
        value = match value {
            Value::Object(mut fields) => fields.remove(member).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }

    Ok(value)
}

fn apply(op: BinaryOp, left: Value, right: Value) -> EvalResult {
    match op {
        BinaryOp::And => Ok(match (left, right) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (left, right) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Null,
        }),
        BinaryOp::Eq => Ok(Value::Bool(equals(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(&left, &right))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = compare(&left, &right).ok_or_else(|| {
                format!(
                    "can't compare {} with {}",
                    ResultType::of(&left),
                    ResultType::of(&right)
                )
            })?;
            let holds = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Lte => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(holds))
        }
        BinaryOp::Add => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(Value::String(l + &r)),
            (Value::Number(l), Value::Number(r)) => Ok(number(as_f64(&l) + as_f64(&r))),
            (l, r) => Err(mismatch(op, &l, &r)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => {
                let (l, r) = (as_f64(l), as_f64(r));
                Ok(match op {
                    BinaryOp::Sub => number(l - r),
                    BinaryOp::Mul => number(l * r),
                    _ if r == 0.0 => Value::Null,
                    _ => number(l / r),
                })
            }
            _ => Err(mismatch(op, &left, &right)),
        },
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => as_f64(l) == as_f64(r),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => as_f64(l).partial_cmp(&as_f64(r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> String {
    format!(
        "can't apply '{}' to {} and {}",
        op.symbol(),
        ResultType::of(left),
        ResultType::of(right)
    )
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(0.0)
}

/// Integral results stay integers so `1 + 2` renders as `3`
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
