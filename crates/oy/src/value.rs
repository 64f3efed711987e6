//! The runtime value model.
//!
//! A `Value` is a tagged union with value semantics for scalars and
//! shallow-reference semantics for containers, closures and iterators:
//! cloning a `Value::Array` clones the `Rc`, not the elements. Container
//! stores always clone the incoming `Value` before placing it, so later
//! writes to the source register never alias into the container (though a
//! stored container reference still shares its payload, by design).

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashSet;
use indexmap::IndexMap;
use strum::Display;

use crate::bytecode::{BuiltinFn, Executable, FunctionPrototype};

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type StructureMap = IndexMap<FieldKey, Value, ahash::RandomState>;
pub type StructureRef = Rc<RefCell<StructureMap>>;
pub type CaptureRef = Rc<RefCell<Capture>>;
pub type IteratorRef = Rc<RefCell<IteratorCell>>;

/// The kind tag of a value, as reported by `typeof` and used in
/// incompatible-operand diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Void,
    Null,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Struct,
    Closure,
    #[strum(serialize = "builtin-function")]
    BuiltinFunction,
    Iterator,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The absence of a value. VOID appearing where a value is required
    /// is an error, enforced by the instructions that consume values.
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Struct(StructureRef),
    Closure(Rc<ClosureCell>),
    Builtin(BuiltinFn),
    Iterator(IteratorRef),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Void => ValueKind::Void,
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Array(_) => ValueKind::Array,
            Self::Struct(_) => ValueKind::Struct,
            Self::Closure(_) => ValueKind::Closure,
            Self::Builtin(_) => ValueKind::BuiltinFunction,
            Self::Iterator(_) => ValueKind::Iterator,
        }
    }

    #[must_use]
    pub fn new_array() -> Self {
        Self::Array(Rc::new(RefCell::new(Vec::new())))
    }

    #[must_use]
    pub fn new_structure() -> Self {
        Self::Struct(Rc::new(RefCell::new(StructureMap::default())))
    }

    #[must_use]
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Self::Str(text.into())
    }

    /// Truthiness per kind; `None` for VOID, which is forbidden in
    /// boolean contexts.
    #[must_use]
    pub fn truthy(&self) -> Option<bool> {
        let truthy = match self {
            Self::Void => return None,
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Array(elements) => !elements.borrow().is_empty(),
            Self::Struct(fields) => !fields.borrow().is_empty(),
            Self::Closure(_) | Self::Builtin(_) => true,
            Self::Iterator(cell) => cell.borrow().has_next(),
        };
        Some(truthy)
    }

    /// Equality: scalars of the same kind compare by data, numeric
    /// cross-kind operands compare by value, and every other pairing —
    /// including two references to the same array or structure — is
    /// unequal. Callers reject VOID operands before comparing.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(l), Self::Bool(r)) => l == r,
            (Self::Int(l), Self::Int(r)) => l == r,
            (Self::Float(l), Self::Float(r)) => l == r,
            (Self::Int(l), Self::Float(r)) => (*l as f64) == *r,
            (Self::Float(l), Self::Int(r)) => *l == (*r as f64),
            (Self::Str(l), Self::Str(r)) => l == r,
            _ => false,
        }
    }

    fn render(&self, out: &mut String, seen: &mut AHashSet<usize>) {
        match self {
            Self::Void => {}
            Self::Null => out.push_str("null"),
            Self::Bool(true) => out.push_str("true"),
            Self::Bool(false) => out.push_str("false"),
            Self::Int(n) => out.push_str(&n.to_string()),
            Self::Float(x) => out.push_str(ryu::Buffer::new().format(*x)),
            Self::Str(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Self::Array(elements) => {
                let id = Rc::as_ptr(elements) as usize;
                if !seen.insert(id) {
                    out.push_str("...");
                    return;
                }
                out.push_str("[] {");
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    element.render(out, seen);
                }
                out.push('}');
                seen.remove(&id);
            }
            Self::Struct(fields) => {
                let id = Rc::as_ptr(fields) as usize;
                if !seen.insert(id) {
                    out.push_str("...");
                    return;
                }
                out.push_str("struct {");
                for (i, (key, value)) in fields.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('[');
                    key.to_value().render(out, seen);
                    out.push_str("] = ");
                    value.render(out, seen);
                }
                out.push('}');
                seen.remove(&id);
            }
            Self::Closure(_) => out.push_str("<closure>"),
            Self::Builtin(_) => out.push_str("<builtin-function>"),
            Self::Iterator(_) => out.push_str("<iterator>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, &mut AHashSet::new());
        f.write_str(&out)
    }
}

/// A structure key: any scalar value kind. FLOATING_POINT keys hash and
/// compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
}

impl FieldKey {
    /// Converts a scalar value to a key; `None` for VOID and for the
    /// reference kinds.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let key = match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(n) => Self::Int(*n),
            Value::Float(x) => Self::Float(x.to_bits()),
            Value::Str(s) => Self::Str(Rc::clone(s)),
            _ => return None,
        };
        Some(key)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Int(*n),
            Self::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Self::Str(s) => Value::Str(Rc::clone(s)),
        }
    }
}

/// A capture cell shared by every closure that references the same free
/// variable. While the producing frame is alive the cell aliases its stack
/// slot; when that frame returns the cell is detached onto an owned copy,
/// and all sharers keep seeing one another's writes through it.
#[derive(Debug, PartialEq)]
pub enum Capture {
    /// Aliases the register file at this absolute index.
    Live(usize),
    /// Owns its value; the producing frame has returned.
    Detached(Value),
}

/// A callable script value: a prototype plus the default arguments and
/// capture cells fixed at construction time.
#[derive(Debug, PartialEq)]
pub struct ClosureCell {
    pub executable: Rc<Executable>,
    pub prototype_id: usize,
    pub defaults: Vec<Value>,
    pub captures: Vec<CaptureRef>,
}

impl ClosureCell {
    #[must_use]
    pub fn prototype(&self) -> &FunctionPrototype {
        self.executable.prototype(self.prototype_id)
    }
}

/// Iteration state over an array or structure.
///
/// The cell holds the live container and a cursor; truthiness re-checks
/// the container's current length, so the prefetch contract ("a truthy
/// test guarantees the next advance yields that pair") holds even while
/// the container is mutated mid-loop.
#[derive(Debug, PartialEq)]
pub struct IteratorCell {
    source: IteratorSource,
    cursor: usize,
}

#[derive(Debug, PartialEq)]
enum IteratorSource {
    Array(ArrayRef),
    Struct(StructureRef),
}

impl IteratorCell {
    #[must_use]
    pub fn over_array(elements: ArrayRef) -> Self {
        Self {
            source: IteratorSource::Array(elements),
            cursor: 0,
        }
    }

    #[must_use]
    pub fn over_structure(fields: StructureRef) -> Self {
        Self {
            source: IteratorSource::Struct(fields),
            cursor: 0,
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        match &self.source {
            IteratorSource::Array(elements) => self.cursor < elements.borrow().len(),
            IteratorSource::Struct(fields) => self.cursor < fields.borrow().len(),
        }
    }

    /// Yields the next (key, value) pair: (index, element) for arrays in
    /// order, (field key, field value) for structures in insertion order.
    pub fn advance(&mut self) -> Option<(Value, Value)> {
        let pair = match &self.source {
            IteratorSource::Array(elements) => {
                let elements = elements.borrow();
                let element = elements.get(self.cursor)?;
                (
                    Value::Int(i64::try_from(self.cursor).expect("array length fits i64")),
                    element.clone(),
                )
            }
            IteratorSource::Struct(fields) => {
                let fields = fields.borrow();
                let (key, value) = fields.get_index(self.cursor)?;
                (key.to_value(), value.clone())
            }
        };
        self.cursor += 1;
        Some(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality_is_by_data() {
        assert!(Value::Null.equals(&Value::Null));
        assert!(Value::Int(3).equals(&Value::Int(3)));
        assert!(!Value::Int(3).equals(&Value::Int(4)));
        assert!(Value::string("ab").equals(&Value::string("ab")));
        assert!(Value::Bool(true).equals(&Value::Bool(true)));
    }

    #[test]
    fn numeric_cross_kind_equality_is_by_value() {
        assert!(Value::Int(3).equals(&Value::Float(3.0)));
        assert!(Value::Float(3.0).equals(&Value::Int(3)));
        assert!(!Value::Int(3).equals(&Value::Float(3.5)));
    }

    #[test]
    fn containers_never_compare_equal() {
        let array = Value::new_array();
        assert!(!array.equals(&array.clone()));
        assert!(!Value::Null.equals(&Value::Int(0)));
        assert!(!Value::Bool(false).equals(&Value::Int(0)));
    }

    #[test]
    fn truthiness() {
        assert_eq!(Value::Void.truthy(), None);
        assert_eq!(Value::Null.truthy(), Some(false));
        assert_eq!(Value::Int(0).truthy(), Some(false));
        assert_eq!(Value::Int(-1).truthy(), Some(true));
        assert_eq!(Value::string("").truthy(), Some(false));
        assert_eq!(Value::string("x").truthy(), Some(true));
        assert_eq!(Value::new_array().truthy(), Some(false));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::string("hi").to_string(), "\"hi\"");

        let array = Value::new_array();
        if let Value::Array(elements) = &array {
            elements.borrow_mut().push(Value::Int(1));
            elements.borrow_mut().push(Value::string("x"));
        }
        assert_eq!(array.to_string(), "[] {1, \"x\"}");
    }

    #[test]
    fn cyclic_display_is_cut_off() {
        let array = Value::new_array();
        if let Value::Array(elements) = &array {
            elements.borrow_mut().push(array.clone());
        }
        assert_eq!(array.to_string(), "[] {...}");
    }

    #[test]
    fn structure_iteration_is_in_insertion_order() {
        let structure = Value::new_structure();
        if let Value::Struct(fields) = &structure {
            let mut fields = fields.borrow_mut();
            fields.insert(FieldKey::Str(Rc::from("b")), Value::Int(1));
            fields.insert(FieldKey::Str(Rc::from("a")), Value::Int(2));
        }
        let Value::Struct(fields) = &structure else {
            unreachable!()
        };
        let mut iterator = IteratorCell::over_structure(Rc::clone(fields));
        let (first_key, first_value) = iterator.advance().unwrap();
        assert_eq!(first_key.to_string(), "\"b\"");
        assert!(first_value.equals(&Value::Int(1)));
        let (second_key, _) = iterator.advance().unwrap();
        assert_eq!(second_key.to_string(), "\"a\"");
        assert!(!iterator.has_next());
    }
}
