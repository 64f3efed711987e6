//! A small dynamically-typed scripting language with a C-like surface
//! syntax, compiled ahead of execution to a register bytecode and run by
//! an embedded interpreter.
//!
//! The pipeline is linear: source text → [`Scanner`] → [`Parser`] → AST →
//! [`BytecodeGenerator`] → [`Executable`] → [`Interpreter`]. [`Script`]
//! bundles the compile half, [`ModuleLoader`] adds `require()` module
//! loading on top, and the `oy` binary is a thin wrapper over both.

pub mod ast;

mod bytecode;
mod error;
mod io;
mod location;
mod parser;
mod run;
mod scanner;
mod token;
mod value;

pub use crate::{
    bytecode::{
        BuiltinFn, Bytecode, BytecodeGenerator, CaptureDescriptor, Constant, Conversion, Executable,
        FunctionPrototype, Instruction, Interpreter, MAX_STACK_DEPTH, Opcode, REGISTER_POOL_SIZE,
    },
    error::{CompileError, CompileErrorKind, CompileResult, RunResult, RuntimeError, RuntimeErrorKind},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    location::SourceLocation,
    parser::Parser,
    run::{Host, ModuleLoader, Script, ScriptError, compile},
    scanner::Scanner,
    token::{Token, TokenKind},
    value::{
        ArrayRef, Capture, CaptureRef, ClosureCell, FieldKey, IteratorCell, IteratorRef, StructureMap,
        StructureRef, Value, ValueKind,
    },
};
