//! Bytecode core: compiled artifacts, the generator and the interpreter.
//!
//! # Module Structure
//!
//! - `op` - opcode and operand-ID enums
//! - `code` - instruction buffer, prototypes, executable, constant pools
//! - `registers` - the compiler's register allocator and target stack
//! - `scope` - per-function scopes and capture tables
//! - `compiler` - AST to bytecode generator
//! - `vm` - the interpreter

pub use code::{Bytecode, CaptureDescriptor, Constant, Executable, FunctionPrototype, Instruction};
pub use compiler::{BytecodeGenerator, REGISTER_POOL_SIZE};
pub use op::{BuiltinFn, Conversion, IMMEDIATE_FLAG, Opcode};
pub use registers::{RegisterPool, RegisterStack};
pub use scope::{CaptureTable, FunctionScope, VariableRef};
pub use vm::{Interpreter, MAX_STACK_DEPTH};

mod code;
mod compiler;
mod op;
mod registers;
mod scope;
mod vm;
