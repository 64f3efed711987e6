//! Opcode and operand-ID enums.
//!
//! Opcodes occupy the low 7 bits of an instruction's fourth byte; the high
//! bit flags a trailing 32-bit signed immediate. The strum derives give us
//! byte decoding (`from_repr`) and the names used by the bytecode dump.

use strum::{Display, FromRepr, IntoStaticStr};

/// Set in the instruction's opcode byte when a 32-bit immediate follows.
pub const IMMEDIATE_FLAG: u8 = 0x80;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    LoadVoid = 0,
    LoadNull,
    LoadBoolean,
    LoadInteger,
    LoadConstant,
    LoadBuiltinFunction,

    Move,
    Convert,

    GetCapture,
    SetCapture,
    GetSlot,
    SetSlot,
    ClearSlot,

    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    LogicalNot,

    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    BitwiseShiftLeft,
    BitwiseShiftRight,

    Equal,
    NotEqual,
    Less,
    NotLess,
    Greater,
    NotGreater,

    Jump,
    JumpIfTrue,
    JumpIfFalse,

    NewArray,
    NewStructure,

    NewClosure,
    KillOriginalCaptures,
    Call,
    Return,

    NewIterator,
    Iterate,
}

/// Conversion IDs carried in `CONVERT`'s third operand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
pub enum Conversion {
    Bool = 0,
    Int,
    Float,
    Str,
    Sizeof,
    Typeof,
}

/// Builtin function IDs carried in `LOAD_BUILTIN_FUNCTION`'s second
/// operand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinFn {
    Trace = 0,
    Require,
}
