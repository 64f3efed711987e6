//! Compile-time and runtime error types.
//!
//! Both families pair an error kind with the source location it is pinned
//! to and render as `<file>:<line>:<column>: <description>`. Compile errors
//! abort the whole compilation; runtime errors unwind the entire call chain
//! to the host (there is no in-language catch).

use std::fmt;

use crate::{location::SourceLocation, token::TokenKind, value::ValueKind};

/// Result alias for the scanner, parser and bytecode generator.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result alias for the interpreter and builtins.
pub type RunResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    UnexpectedChar(char),
    UnexpectedToken {
        found: String,
        expected: Vec<TokenKind>,
    },
    EndOfFile,
    LocalVariableExists(String),
    VariableNotFound(String),
    StackTooDeep,
    CaptureTableTooLarge,
    ConstantTableTooLarge,
    BytecodeTooLarge,
    LvalueRequired,
}

impl CompileError {
    #[must_use]
    pub fn new(kind: CompileErrorKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.location)?;
        match &self.kind {
            CompileErrorKind::UnexpectedChar(c) => write!(f, "unexpected char '{c}'"),
            CompileErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "unexpected token '{found}'")?;
                if !expected.is_empty() {
                    write!(f, ", expect ")?;
                    for (i, kind) in expected.iter().enumerate() {
                        if i > 0 {
                            write!(f, " or ")?;
                        }
                        write!(f, "{kind}")?;
                    }
                }
                Ok(())
            }
            CompileErrorKind::EndOfFile => write!(f, "end of file"),
            CompileErrorKind::LocalVariableExists(name) => {
                write!(f, "local variable `{name}` exists")
            }
            CompileErrorKind::VariableNotFound(name) => {
                write!(f, "variable `{name}` not found")
            }
            CompileErrorKind::StackTooDeep => write!(f, "stack too deep"),
            CompileErrorKind::CaptureTableTooLarge => write!(f, "capture table too large"),
            CompileErrorKind::ConstantTableTooLarge => write!(f, "constant table too large"),
            CompileErrorKind::BytecodeTooLarge => write!(f, "bytecode too large"),
            CompileErrorKind::LvalueRequired => write!(f, "lvalue required"),
        }
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum RuntimeErrorKind {
    StackOverflow,
    MissingArgument,
    TooManyArguments,
    /// An instruction received operands of kinds it is not defined for.
    IncompatibleOperandTypes(Vec<ValueKind>),
    IndexOutOfRange,
    DivideByZero,
    /// Raised by a host builtin, e.g. `require() failed: circular dependency`.
    Host(String),
    /// A script loaded through `require()` failed to compile.
    Compilation(Box<CompileError>),
}

impl RuntimeError {
    #[must_use]
    pub fn new(kind: RuntimeErrorKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// Shorthand for the most common failure: wrong operand kinds.
    #[must_use]
    pub fn incompatible(location: SourceLocation, kinds: impl Into<Vec<ValueKind>>) -> Self {
        Self::new(RuntimeErrorKind::IncompatibleOperandTypes(kinds.into()), location)
    }

    #[must_use]
    pub fn host(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Host(message.into()), location)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.location)?;
        match &self.kind {
            RuntimeErrorKind::StackOverflow => write!(f, "stack overflow"),
            RuntimeErrorKind::MissingArgument => write!(f, "missing argument"),
            RuntimeErrorKind::TooManyArguments => write!(f, "too many arguments"),
            RuntimeErrorKind::IncompatibleOperandTypes(kinds) => {
                write!(f, "incompatible operand type(s): ")?;
                for (i, kind) in kinds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{kind}")?;
                }
                Ok(())
            }
            RuntimeErrorKind::IndexOutOfRange => write!(f, "index out of range"),
            RuntimeErrorKind::DivideByZero => write!(f, "divide by zero"),
            RuntimeErrorKind::Host(message) => write!(f, "{message}"),
            RuntimeErrorKind::Compilation(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for RuntimeError {}
