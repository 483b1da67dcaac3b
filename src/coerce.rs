//! Operand coercion and comparison helpers used by the evaluator

use crate::ast::{BinaryOperator, Value};
use crate::error::EvalisError;
use std::cmp::Ordering;

/// Numeric view of a scalar operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// Numbers as themselves, null as 0, booleans as 0/1
pub fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Null => Some(Number::Int(0)),
        Value::Bool(b) => Some(Number::Int(i64::from(*b))),
        Value::Int(i) => Some(Number::Int(*i)),
        Value::Float(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

/// `+`: null, string concatenation, numeric addition or list concatenation
pub fn add(left: Value, right: Value) -> Result<Value, EvalisError> {
    match (left, right) {
        (Value::Null, Value::Null) => Ok(Value::Null),
        (left, right) if should_concat(&left, &right) => Ok(Value::String(
            left.to_string_repr() + &right.to_string_repr(),
        )),
        (left, right) if left.is_scalar() && right.is_scalar() => {
            arithmetic(BinaryOperator::Add, &left, &right)
        }
        (Value::List(mut left), Value::List(right)) => {
            left.extend(right);
            Ok(Value::List(left))
        }
        (left, right) => Err(EvalisError::type_error(format!(
            "Cannot use + operator with types {} and {}",
            left.kind(),
            right.kind()
        ))),
    }
}

/// At least one side is a string and the other a scalar
fn should_concat(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(_), other) | (other, Value::String(_)) => other.is_scalar(),
        _ => false,
    }
}

/// Numeric `+`, `-`, `*` and `/`
///
/// Integer results stay integers unless they overflow; division is always
/// real-number division.
pub fn arithmetic(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, EvalisError> {
    let (l, r) = match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(EvalisError::type_error(format!(
                "Cannot use {} operator with types {} and {}",
                op,
                left.kind(),
                right.kind()
            )))
        }
    };

    let checked: fn(i64, i64) -> Option<i64> = match op {
        BinaryOperator::Add => i64::checked_add,
        BinaryOperator::Subtract => i64::checked_sub,
        BinaryOperator::Multiply => i64::checked_mul,
        BinaryOperator::Divide => {
            return Ok(Value::Float(l.as_f64() / r.as_f64()));
        }
        other => {
            return Err(EvalisError::internal(format!(
                "Operator {} is not arithmetic",
                other
            )))
        }
    };

    let result = match (l, r) {
        (Number::Int(a), Number::Int(b)) => match checked(a, b) {
            Some(i) => Number::Int(i),
            None => Number::Float(float_op(op, a as f64, b as f64)),
        },
        (a, b) => Number::Float(float_op(op, a.as_f64(), b.as_f64())),
    };

    Ok(result.into_value())
}

fn float_op(op: BinaryOperator, l: f64, r: f64) -> f64 {
    match op {
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        _ => l + r,
    }
}

/// Structural equality; integers and floats compare numerically
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => l == r,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            to_f64(left) == to_f64(right)
        }
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Null, Value::Null) => true,
        (Value::List(l), Value::List(r)) => {
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Map(l), Value::Map(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => false,
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

/// Ordering between two numbers or two strings
///
/// `Ok(None)` means the operands are comparable but unordered (NaN).
pub fn compare(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Option<Ordering>, EvalisError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Some(l.cmp(r))),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            Ok(to_f64(left).partial_cmp(&to_f64(right)))
        }
        (Value::String(l), Value::String(r)) => Ok(Some(l.cmp(r))),
        _ => Err(EvalisError::type_error(format!(
            "Cannot use {} operator with types {} and {}",
            op,
            left.kind(),
            right.kind()
        ))),
    }
}
