//! Arithmetic, comparison and bitwise operations with the language's
//! coercion rules.
//!
//! Numeric pairs promote to FLOATING_POINT when the kinds differ; integer
//! arithmetic wraps (two's-complement). `ADD` doubles as string
//! concatenation and the ordering comparisons accept string pairs
//! (lexicographic). Division and remainder by zero are fatal for both
//! numeric kinds.

use std::rc::Rc;

use crate::value::Value;

/// Failure modes reported to the dispatch loop, which attaches operand
/// kinds and the source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpError {
    Incompatible,
    DivideByZero,
}

type OpResult = Result<Value, OpError>;

fn numeric(
    left: &Value,
    right: &Value,
    int_op: impl FnOnce(i64, i64) -> Result<i64, OpError>,
    float_op: impl FnOnce(f64, f64) -> Result<f64, OpError>,
) -> OpResult {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(int_op(*l, *r)?)),
        (Value::Int(l), Value::Float(r)) => Ok(Value::Float(float_op(*l as f64, *r)?)),
        (Value::Float(l), Value::Int(r)) => Ok(Value::Float(float_op(*l, *r as f64)?)),
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(float_op(*l, *r)?)),
        _ => Err(OpError::Incompatible),
    }
}

fn integers(left: &Value, right: &Value, op: impl FnOnce(i64, i64) -> i64) -> OpResult {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Ok(Value::Int(op(*l, *r))),
        _ => Err(OpError::Incompatible),
    }
}

pub(crate) fn add(left: &Value, right: &Value) -> OpResult {
    if let Value::Str(l) = left {
        let Value::Str(r) = right else {
            return Err(OpError::Incompatible);
        };
        let mut text = String::with_capacity(l.len() + r.len());
        text.push_str(l);
        text.push_str(r);
        return Ok(Value::Str(Rc::from(text)));
    }
    numeric(left, right, |l, r| Ok(l.wrapping_add(r)), |l, r| Ok(l + r))
}

pub(crate) fn subtract(left: &Value, right: &Value) -> OpResult {
    numeric(left, right, |l, r| Ok(l.wrapping_sub(r)), |l, r| Ok(l - r))
}

pub(crate) fn multiply(left: &Value, right: &Value) -> OpResult {
    numeric(left, right, |l, r| Ok(l.wrapping_mul(r)), |l, r| Ok(l * r))
}

pub(crate) fn divide(left: &Value, right: &Value) -> OpResult {
    numeric(
        left,
        right,
        |l, r| {
            if r == 0 {
                Err(OpError::DivideByZero)
            } else {
                Ok(l.wrapping_div(r))
            }
        },
        |l, r| {
            if r == 0.0 {
                Err(OpError::DivideByZero)
            } else {
                Ok(l / r)
            }
        },
    )
}

pub(crate) fn modulo(left: &Value, right: &Value) -> OpResult {
    numeric(
        left,
        right,
        |l, r| {
            if r == 0 {
                Err(OpError::DivideByZero)
            } else {
                Ok(l.wrapping_rem(r))
            }
        },
        |l, r| {
            if r == 0.0 {
                Err(OpError::DivideByZero)
            } else {
                Ok(l % r)
            }
        },
    )
}

pub(crate) fn bitwise_and(left: &Value, right: &Value) -> OpResult {
    integers(left, right, |l, r| l & r)
}

pub(crate) fn bitwise_or(left: &Value, right: &Value) -> OpResult {
    integers(left, right, |l, r| l | r)
}

pub(crate) fn bitwise_xor(left: &Value, right: &Value) -> OpResult {
    integers(left, right, |l, r| l ^ r)
}

/// Shift counts wrap modulo the integer width.
pub(crate) fn shift_left(left: &Value, right: &Value) -> OpResult {
    integers(left, right, |l, r| l.wrapping_shl(r as u32))
}

pub(crate) fn shift_right(left: &Value, right: &Value) -> OpResult {
    integers(left, right, |l, r| l.wrapping_shr(r as u32))
}

/// The four ordering comparisons (`<`, `>=`, `>`, `<=`), defined for
/// numeric pairs with promotion and for string pairs.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Ordering {
    Less,
    NotLess,
    Greater,
    NotGreater,
}

pub(crate) fn compare(op: Ordering, left: &Value, right: &Value) -> Result<bool, OpError> {
    if let (Value::Str(l), Value::Str(r)) = (left, right) {
        return Ok(match op {
            Ordering::Less => l < r,
            Ordering::NotLess => l >= r,
            Ordering::Greater => l > r,
            Ordering::NotGreater => l <= r,
        });
    }

    let (l, r) = match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            return Ok(match op {
                Ordering::Less => l < r,
                Ordering::NotLess => l >= r,
                Ordering::Greater => l > r,
                Ordering::NotGreater => l <= r,
            });
        }
        (Value::Int(l), Value::Float(r)) => (*l as f64, *r),
        (Value::Float(l), Value::Int(r)) => (*l, *r as f64),
        (Value::Float(l), Value::Float(r)) => (*l, *r),
        _ => return Err(OpError::Incompatible),
    };
    Ok(match op {
        Ordering::Less => l < r,
        Ordering::NotLess => l >= r,
        Ordering::Greater => l > r,
        Ordering::NotGreater => l <= r,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps() {
        let value = add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(value, Value::Int(i64::MIN)));
    }

    #[test]
    fn mixed_operands_promote_to_float() {
        let value = add(&Value::Int(1), &Value::Float(0.5)).unwrap();
        assert!(matches!(value, Value::Float(x) if x == 1.5));
    }

    #[test]
    fn integer_division_truncates() {
        let value = divide(&Value::Int(7), &Value::Int(2)).unwrap();
        assert!(matches!(value, Value::Int(3)));
        let value = divide(&Value::Int(7), &Value::Float(2.0)).unwrap();
        assert!(matches!(value, Value::Float(x) if x == 3.5));
    }

    #[test]
    fn division_by_zero_is_fatal_for_both_kinds() {
        assert_eq!(divide(&Value::Int(1), &Value::Int(0)), Err(OpError::DivideByZero));
        assert_eq!(divide(&Value::Float(1.0), &Value::Float(0.0)), Err(OpError::DivideByZero));
        assert_eq!(modulo(&Value::Int(1), &Value::Int(0)), Err(OpError::DivideByZero));
    }

    #[test]
    fn string_concatenation_and_ordering() {
        let value = add(&Value::string("ab"), &Value::string("cd")).unwrap();
        assert!(matches!(value, Value::Str(s) if &*s == "abcd"));
        assert!(compare(Ordering::Less, &Value::string("abc"), &Value::string("abd")).unwrap());
        assert!(compare(Ordering::NotGreater, &Value::string("x"), &Value::string("x")).unwrap());
    }

    #[test]
    fn string_plus_number_is_incompatible() {
        assert_eq!(add(&Value::string("a"), &Value::Int(1)), Err(OpError::Incompatible));
        assert_eq!(compare(Ordering::Less, &Value::string("a"), &Value::Int(1)), Err(OpError::Incompatible));
    }

    #[test]
    fn bitwise_is_integer_only() {
        assert!(matches!(bitwise_and(&Value::Int(6), &Value::Int(3)).unwrap(), Value::Int(2)));
        assert_eq!(bitwise_and(&Value::Float(6.0), &Value::Int(3)), Err(OpError::Incompatible));
    }
}
