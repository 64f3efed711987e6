//! AST produced by the parser and consumed by the bytecode generator.
//!
//! Statements contain expressions and expressions (function literals)
//! contain statements; boxing the child nodes breaks that ownership cycle
//! at the value level. Every node carries the source location of its first
//! token.

use std::rc::Rc;

use crate::location::SourceLocation;

/// An identifier occurrence with its position, used for declarations and
/// for name resolution diagnostics.
#[derive(Debug, Clone)]
pub struct Ident {
    pub name: Rc<str>,
    pub location: SourceLocation,
}

/// Conversion operators (`bool(x)`, `int(x)`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOp {
    Bool,
    Int,
    Float,
    Str,
    Sizeof,
    Typeof,
}

/// Builtin function names recognized at expression position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinName {
    Trace,
    Require,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Increment,
    Decrement,
    Plus,
    Minus,
    LogicalNot,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Comma,

    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    AndAssign,
    XorAssign,
    OrAssign,

    LogicalOr,
    LogicalAnd,

    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    /// `container.field` — the key is a synthesized string literal.
    Member,
    /// `container[key]`.
    Index,
}

impl BinaryOp {
    /// True for `=` and every compound assignment.
    #[must_use]
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubtractAssign
                | Self::MultiplyAssign
                | Self::DivideAssign
                | Self::ModuloAssign
                | Self::ShiftLeftAssign
                | Self::ShiftRightAssign
                | Self::AndAssign
                | Self::XorAssign
                | Self::OrAssign
        )
    }

    /// True for the `.`/`[` access forms, the only valid l-value shapes
    /// besides a bare identifier.
    #[must_use]
    pub fn is_access(self) -> bool {
        matches!(self, Self::Member | Self::Index)
    }
}

/// One element of an array literal: an optional explicit index expression
/// (`[i] = v`) and the value. Bare values take the next implicit index.
#[derive(Debug, Clone)]
pub struct ArrayElement {
    pub index: Option<Expr>,
    pub value: Expr,
}

/// One field of a structure literal: key expression and value.
#[derive(Debug, Clone)]
pub struct StructureField {
    pub key: Expr,
    pub value: Expr,
}

/// A function literal: regular parameters, defaulted parameters, an
/// optional rest parameter and the body statements. The whole program is
/// one of these with a rest parameter named `argv`.
#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub parameters: Vec<Ident>,
    pub default_parameters: Vec<(Ident, Expr)>,
    pub rest_parameter: Option<Ident>,
    pub body: Vec<Stmt>,
    pub body_location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null {
        location: SourceLocation,
    },
    Boolean {
        location: SourceLocation,
        value: bool,
    },
    Integer {
        location: SourceLocation,
        value: i64,
    },
    Float {
        location: SourceLocation,
        value: f64,
    },
    Str {
        location: SourceLocation,
        value: Rc<str>,
    },
    Identifier(Ident),
    ArrayLiteral {
        location: SourceLocation,
        elements: Vec<ArrayElement>,
    },
    StructureLiteral {
        location: SourceLocation,
        fields: Vec<StructureField>,
    },
    FunctionLiteral {
        location: SourceLocation,
        function: Box<FunctionLiteral>,
    },
    Builtin {
        location: SourceLocation,
        name: BuiltinName,
    },
    Convert {
        location: SourceLocation,
        op: ConversionOp,
        operand: Box<Expr>,
    },
    Prefix {
        location: SourceLocation,
        op: PrefixOp,
        operand: Box<Expr>,
    },
    Postfix {
        location: SourceLocation,
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Binary {
        location: SourceLocation,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        location: SourceLocation,
        condition: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    /// A call: `operands[0]` is the callee, the rest are arguments.
    Call {
        location: SourceLocation,
        operands: Vec<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub fn location(&self) -> &SourceLocation {
        match self {
            Self::Null { location }
            | Self::Boolean { location, .. }
            | Self::Integer { location, .. }
            | Self::Float { location, .. }
            | Self::Str { location, .. }
            | Self::ArrayLiteral { location, .. }
            | Self::StructureLiteral { location, .. }
            | Self::FunctionLiteral { location, .. }
            | Self::Builtin { location, .. }
            | Self::Convert { location, .. }
            | Self::Prefix { location, .. }
            | Self::Postfix { location, .. }
            | Self::Binary { location, .. }
            | Self::Ternary { location, .. }
            | Self::Call { location, .. } => location,
            Self::Identifier(ident) => &ident.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchClause {
    pub location: SourceLocation,
    /// `None` for the `default:` clause.
    pub label: Option<Expr>,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Null {
        location: SourceLocation,
    },
    Block {
        location: SourceLocation,
        statements: Vec<Stmt>,
    },
    Auto {
        location: SourceLocation,
        variables: Vec<(Ident, Option<Expr>)>,
    },
    Return {
        location: SourceLocation,
        expression: Option<Expr>,
    },
    Delete {
        location: SourceLocation,
        container: Expr,
        key: Expr,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    If {
        location: SourceLocation,
        initialization: Option<Box<Stmt>>,
        condition: Expr,
        then_body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
    },
    Switch {
        location: SourceLocation,
        initialization: Option<Box<Stmt>>,
        discriminant: Expr,
        clauses: Vec<SwitchClause>,
    },
    While {
        location: SourceLocation,
        initialization: Option<Box<Stmt>>,
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        location: SourceLocation,
        body: Box<Stmt>,
        initialization: Option<Box<Stmt>>,
        condition: Expr,
    },
    For {
        location: SourceLocation,
        initialization: Option<Box<Stmt>>,
        condition: Option<Expr>,
        iteration: Option<Expr>,
        body: Box<Stmt>,
    },
    Foreach {
        location: SourceLocation,
        key: Ident,
        value: Option<Ident>,
        container: Expr,
        body: Box<Stmt>,
    },
    Expression {
        location: SourceLocation,
        expression: Expr,
    },
}
