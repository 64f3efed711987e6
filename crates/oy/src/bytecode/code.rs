//! Compiled artifacts: the instruction buffer, function prototypes and the
//! executable with its interned constant pools.
//!
//! Instructions are 4 bytes (three 8-bit operands plus the opcode byte) or
//! 8 bytes when the opcode byte carries the immediate flag and a 32-bit
//! signed little-endian immediate follows. The buffer supports append,
//! in-place operand patching (used for jump backpatching) and sequential
//! decode. None of this is a stable on-disk format; it lives for one run.

use std::fmt::Write as _;
use std::rc::Rc;

use ahash::AHashMap;

use super::op::{IMMEDIATE_FLAG, Opcode};
use crate::{
    error::{CompileError, CompileErrorKind, CompileResult},
    location::SourceLocation,
};

/// Instruction buffers and constant pools are capped so every offset and
/// constant ID fits a 32-bit signed immediate.
pub const MAX_BYTECODE_LENGTH: usize = i32::MAX as usize;
pub const MAX_CONSTANTS: usize = i32::MAX as usize;

/// One decoded instruction.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub opcode: Opcode,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub immediate: Option<i32>,
    /// Offset of the following instruction.
    pub next_offset: usize,
}

/// Raised by `Bytecode::push` when the buffer limit is hit; the prototype
/// wraps it into a located `BytecodeTooLarge`.
#[derive(Debug)]
pub(crate) struct BytecodeOverflow;

#[derive(Debug, Default, PartialEq)]
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        opcode: Opcode,
        a: u8,
        b: u8,
        c: u8,
        immediate: Option<i32>,
    ) -> Result<usize, BytecodeOverflow> {
        let offset = self.bytes.len();
        self.bytes.push(a);
        self.bytes.push(b);
        self.bytes.push(c);
        match immediate {
            None => self.bytes.push(opcode as u8),
            Some(value) => {
                self.bytes.push(opcode as u8 | IMMEDIATE_FLAG);
                self.bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        if self.bytes.len() > MAX_BYTECODE_LENGTH {
            self.bytes.truncate(offset);
            return Err(BytecodeOverflow);
        }
        Ok(offset)
    }

    /// Rewrites the immediate of the instruction at `offset`. The
    /// instruction must have been emitted with one.
    pub fn patch_immediate(&mut self, offset: usize, value: i32) {
        assert!(
            self.bytes[offset + 3] & IMMEDIATE_FLAG != 0,
            "patching an instruction without an immediate"
        );
        self.bytes[offset + 4..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Decodes the instruction at `offset`.
    ///
    /// # Panics
    /// Panics on an invalid opcode byte; the buffer is only ever produced
    /// by the generator, so that indicates corruption.
    #[must_use]
    pub fn decode(&self, offset: usize) -> Instruction {
        let a = self.bytes[offset];
        let b = self.bytes[offset + 1];
        let c = self.bytes[offset + 2];
        let tag = self.bytes[offset + 3];
        let opcode = Opcode::from_repr(tag & !IMMEDIATE_FLAG).expect("invalid opcode in bytecode");
        if tag & IMMEDIATE_FLAG == 0 {
            Instruction {
                opcode,
                a,
                b,
                c,
                immediate: None,
                next_offset: offset + 4,
            }
        } else {
            let raw: [u8; 4] = self.bytes[offset + 4..offset + 8]
                .try_into()
                .expect("truncated immediate");
            Instruction {
                opcode,
                a,
                b,
                c,
                immediate: Some(i32::from_le_bytes(raw)),
                next_offset: offset + 8,
            }
        }
    }

    /// Sequential decode from the start of the buffer.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Instruction)> + '_ {
        let mut offset = 0;
        std::iter::from_fn(move || {
            if offset >= self.bytes.len() {
                return None;
            }
            let instruction = self.decode(offset);
            let at = offset;
            offset = instruction.next_offset;
            Some((at, instruction))
        })
    }
}

/// How a closure obtains one capture when it is constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureDescriptor {
    /// The variable is a local of the enclosing function, living in the
    /// given register of the enclosing frame.
    Original(u8),
    /// The variable is already foreign to the enclosing function; reuse
    /// the enclosing closure's capture at this index.
    Inherited(u32),
}

/// The compiled form of one function body.
#[derive(Debug, Default, PartialEq)]
pub struct FunctionPrototype {
    regular_parameters: usize,
    default_parameters: usize,
    variadic: bool,
    bytecode: Bytecode,
    locations: AHashMap<usize, SourceLocation>,
    captures: Vec<CaptureDescriptor>,
    register_count: usize,
}

impl FunctionPrototype {
    #[must_use]
    pub fn new(regular_parameters: usize, default_parameters: usize, variadic: bool) -> Self {
        Self {
            regular_parameters,
            default_parameters,
            variadic,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn regular_parameters(&self) -> usize {
        self.regular_parameters
    }

    #[must_use]
    pub fn default_parameters(&self) -> usize {
        self.default_parameters
    }

    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    #[must_use]
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    #[must_use]
    pub fn captures(&self) -> &[CaptureDescriptor] {
        &self.captures
    }

    #[must_use]
    pub fn register_count(&self) -> usize {
        self.register_count
    }

    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.bytecode.next_offset()
    }

    /// Appends an instruction, recording its source location for stack
    /// traces, and returns its offset.
    pub fn add_instruction(
        &mut self,
        location: &SourceLocation,
        opcode: Opcode,
        a: u8,
        b: u8,
        c: u8,
        immediate: Option<i32>,
    ) -> CompileResult<usize> {
        let offset = self
            .bytecode
            .push(opcode, a, b, c, immediate)
            .map_err(|BytecodeOverflow| {
                CompileError::new(CompileErrorKind::BytecodeTooLarge, location.clone())
            })?;
        self.locations.insert(offset, location.clone());
        Ok(offset)
    }

    pub fn patch_immediate(&mut self, offset: usize, value: i32) {
        self.bytecode.patch_immediate(offset, value);
    }

    /// The source location recorded for the instruction at `offset`.
    #[must_use]
    pub fn location_of(&self, offset: usize) -> &SourceLocation {
        self.locations
            .get(&offset)
            .expect("every emitted instruction has a location")
    }

    pub(crate) fn push_capture(&mut self, descriptor: CaptureDescriptor) {
        self.captures.push(descriptor);
    }

    pub(crate) fn set_register_count(&mut self, count: usize) {
        self.register_count = count;
    }
}

/// An interned constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
}

#[derive(Debug, Default, PartialEq)]
struct ConstantPool {
    constants: Vec<Constant>,
    ints: AHashMap<i64, i32>,
    floats: AHashMap<u64, i32>,
    strings: AHashMap<Rc<str>, i32>,
}

impl ConstantPool {
    fn push(&mut self, constant: Constant, location: &SourceLocation) -> CompileResult<i32> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::new(
                CompileErrorKind::ConstantTableTooLarge,
                location.clone(),
            ));
        }
        let id = i32::try_from(self.constants.len()).expect("pool length capped to i32");
        self.constants.push(constant);
        Ok(id)
    }
}

/// A compiled program: function prototypes plus the constant pools shared
/// by all of them. Constants are interned by equality within their kind,
/// so identical literals across the whole program share one ID.
#[derive(Debug, Default, PartialEq)]
pub struct Executable {
    prototypes: Vec<FunctionPrototype>,
    pool: ConstantPool,
}

impl Executable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next prototype ID before its body is compiled, so
    /// nested `NEW_CLOSURE` emissions can reference it. The slot holds a
    /// placeholder until `install_prototype`.
    pub(crate) fn reserve_prototype(&mut self) -> usize {
        self.prototypes.push(FunctionPrototype::default());
        self.prototypes.len() - 1
    }

    pub(crate) fn install_prototype(&mut self, id: usize, prototype: FunctionPrototype) {
        self.prototypes[id] = prototype;
    }

    #[must_use]
    pub fn prototype(&self, id: usize) -> &FunctionPrototype {
        &self.prototypes[id]
    }

    #[must_use]
    pub fn prototype_count(&self) -> usize {
        self.prototypes.len()
    }

    pub fn add_integer_constant(&mut self, location: &SourceLocation, value: i64) -> CompileResult<i32> {
        if let Some(&id) = self.pool.ints.get(&value) {
            return Ok(id);
        }
        let id = self.pool.push(Constant::Int(value), location)?;
        self.pool.ints.insert(value, id);
        Ok(id)
    }

    pub fn add_float_constant(&mut self, location: &SourceLocation, value: f64) -> CompileResult<i32> {
        if let Some(&id) = self.pool.floats.get(&value.to_bits()) {
            return Ok(id);
        }
        let id = self.pool.push(Constant::Float(value), location)?;
        self.pool.floats.insert(value.to_bits(), id);
        Ok(id)
    }

    pub fn add_string_constant(&mut self, location: &SourceLocation, value: &Rc<str>) -> CompileResult<i32> {
        if let Some(&id) = self.pool.strings.get(value) {
            return Ok(id);
        }
        let id = self.pool.push(Constant::Str(Rc::clone(value)), location)?;
        self.pool.strings.insert(Rc::clone(value), id);
        Ok(id)
    }

    #[must_use]
    pub fn constant(&self, id: i32) -> &Constant {
        &self.pool.constants[usize::try_from(id).expect("constant ids are non-negative")]
    }

    /// Renders every prototype's bytecode, one instruction per line, for
    /// the host's `-d` mode.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, prototype) in self.prototypes.iter().enumerate() {
            let variadic = if prototype.is_variadic() { ", variadic" } else { "" };
            let _ = writeln!(
                out,
                "prototype {id} (parameters: {}+{}{variadic}; registers: {})",
                prototype.regular_parameters(),
                prototype.default_parameters(),
                prototype.register_count(),
            );
            for (offset, instruction) in prototype.bytecode().iter() {
                let _ = write!(
                    out,
                    "{offset:>8}  {:<22}{:>4}{:>4}{:>4}",
                    instruction.opcode.to_string(),
                    instruction.a,
                    instruction.b,
                    instruction.c,
                );
                if let Some(immediate) = instruction.immediate {
                    let _ = write!(out, "{immediate:>14}");
                    if instruction.opcode == Opcode::LoadConstant {
                        let _ = write!(out, "  ; {}", self.render_constant(immediate));
                    }
                }
                out.push('\n');
            }
        }
        out
    }

    fn render_constant(&self, id: i32) -> String {
        match self.constant(id) {
            Constant::Int(value) => value.to_string(),
            Constant::Float(value) => ryu::Buffer::new().format(*value).to_owned(),
            Constant::Str(value) => format!("{value:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("test.oy".into(), 1, 1)
    }

    #[test]
    fn encode_patch_decode() {
        let mut bytecode = Bytecode::default();
        let short = bytecode.push(Opcode::Move, 1, 2, 0, None).unwrap();
        let long = bytecode.push(Opcode::Jump, 0, 0, 0, Some(0)).unwrap();
        assert_eq!((short, long), (0, 4));
        assert_eq!(bytecode.len(), 12);

        bytecode.patch_immediate(long, 12);

        let first = bytecode.decode(0);
        assert_eq!(first.opcode, Opcode::Move);
        assert_eq!((first.a, first.b), (1, 2));
        assert_eq!(first.immediate, None);
        assert_eq!(first.next_offset, 4);

        let second = bytecode.decode(4);
        assert_eq!(second.opcode, Opcode::Jump);
        assert_eq!(second.immediate, Some(12));
        assert_eq!(second.next_offset, 12);
    }

    #[test]
    fn negative_immediates_round_trip() {
        let mut bytecode = Bytecode::default();
        bytecode.push(Opcode::LoadInteger, 0, 0, 0, Some(-7)).unwrap();
        assert_eq!(bytecode.decode(0).immediate, Some(-7));
    }

    #[test]
    fn constants_are_interned_by_kind() {
        let mut executable = Executable::new();
        let a = executable.add_integer_constant(&loc(), 42).unwrap();
        let b = executable.add_integer_constant(&loc(), 42).unwrap();
        let c = executable.add_integer_constant(&loc(), 43).unwrap();
        let s1 = executable.add_string_constant(&loc(), &Rc::from("hi")).unwrap();
        let s2 = executable.add_string_constant(&loc(), &Rc::from("hi")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(s1, s2);
        assert_ne!(a, s1);
    }
}
