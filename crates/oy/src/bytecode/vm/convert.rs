//! The `CONVERT` instruction: `bool`, `int`, `float`, `str`, `sizeof`
//! and `typeof`.

use std::rc::Rc;

use crate::{bytecode::op::Conversion, value::Value};

/// Applies a conversion. `None` means the input kind is not convertible
/// (an incompatible-operand error); a failed string parse is not an error
/// and yields VOID instead.
pub(crate) fn convert(conversion: Conversion, input: &Value) -> Option<Value> {
    let converted = match conversion {
        Conversion::Bool => Value::Bool(input.truthy()?),
        Conversion::Int => match input {
            Value::Int(_) => input.clone(),
            Value::Float(x) => Value::Int(*x as i64),
            Value::Str(text) => parse_int(text).map_or(Value::Void, Value::Int),
            _ => return None,
        },
        Conversion::Float => match input {
            Value::Float(_) => input.clone(),
            Value::Int(n) => Value::Float(*n as f64),
            Value::Str(text) => text.trim().parse::<f64>().map_or(Value::Void, Value::Float),
            _ => return None,
        },
        Conversion::Str => match input {
            Value::Str(_) => input.clone(),
            Value::Int(n) => Value::string(n.to_string()),
            Value::Float(x) => Value::string(ryu::Buffer::new().format(*x)),
            _ => return None,
        },
        Conversion::Sizeof => {
            let size = match input {
                Value::Str(text) => text.chars().count(),
                Value::Array(elements) => elements.borrow().len(),
                Value::Struct(fields) => fields.borrow().len(),
                _ => return None,
            };
            Value::Int(i64::try_from(size).expect("container sizes fit i64"))
        }
        Conversion::Typeof => Value::Str(Rc::from(input.kind().to_string())),
    };
    Some(converted)
}

/// Decimal or `0x`/`0X` hexadecimal, with optional sign and surrounding
/// whitespace.
fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let value = if let Some(digits) = magnitude.strip_prefix("0x").or_else(|| magnitude.strip_prefix("0X")) {
        i64::from_str_radix(digits, 16).ok()?
    } else {
        magnitude.parse::<i64>().ok()?
    };
    Some(if negative { value.wrapping_neg() } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn int_conversions() {
        assert!(convert(Conversion::Int, &Value::Float(3.9)).unwrap().equals(&Value::Int(3)));
        assert!(convert(Conversion::Int, &Value::Float(-3.9)).unwrap().equals(&Value::Int(-3)));
        assert!(convert(Conversion::Int, &Value::string("42")).unwrap().equals(&Value::Int(42)));
        assert!(convert(Conversion::Int, &Value::string("0x2a")).unwrap().equals(&Value::Int(42)));
        assert!(convert(Conversion::Int, &Value::string("-7")).unwrap().equals(&Value::Int(-7)));
        // parse failure yields VOID, not an error
        assert!(matches!(convert(Conversion::Int, &Value::string("4x")), Some(Value::Void)));
        assert!(convert(Conversion::Int, &Value::Null).is_none());
    }

    #[test]
    fn float_conversions() {
        assert!(convert(Conversion::Float, &Value::Int(2)).unwrap().equals(&Value::Float(2.0)));
        assert!(convert(Conversion::Float, &Value::string("1.5")).unwrap().equals(&Value::Float(1.5)));
        assert!(matches!(convert(Conversion::Float, &Value::string("nope")), Some(Value::Void)));
        assert!(convert(Conversion::Float, &Value::new_array()).is_none());
    }

    #[test]
    fn str_round_trips() {
        for n in [0i64, 7, -42, i64::MAX, i64::MIN] {
            let text = convert(Conversion::Str, &Value::Int(n)).unwrap();
            let back = convert(Conversion::Int, &text).unwrap();
            assert!(back.equals(&Value::Int(n)));
        }
        for x in [0.5f64, -2.25, 1e300] {
            let text = convert(Conversion::Str, &Value::Float(x)).unwrap();
            let back = convert(Conversion::Float, &text).unwrap();
            assert!(back.equals(&Value::Float(x)));
        }
    }

    #[test]
    fn typeof_names() {
        let cases = [
            (Value::Void, "void"),
            (Value::Null, "null"),
            (Value::Bool(true), "bool"),
            (Value::Int(1), "int"),
            (Value::Float(1.0), "float"),
            (Value::string(""), "str"),
            (Value::new_array(), "array"),
            (Value::new_structure(), "struct"),
        ];
        for (value, expected) in cases {
            let Some(Value::Str(name)) = convert(Conversion::Typeof, &value) else {
                panic!("typeof always succeeds");
            };
            assert_eq!(&*name, expected);
        }
        assert_eq!(ValueKind::BuiltinFunction.to_string(), "builtin-function");
    }

    #[test]
    fn sizeof_counts_elements() {
        assert!(convert(Conversion::Sizeof, &Value::string("héllo")).unwrap().equals(&Value::Int(5)));
        assert!(convert(Conversion::Sizeof, &Value::new_array()).unwrap().equals(&Value::Int(0)));
        assert!(convert(Conversion::Sizeof, &Value::Int(3)).is_none());
    }
}
