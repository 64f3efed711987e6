//! Per-function compilation scope: register pool, evaluation-target stack
//! and the capture table of free variables.

use std::rc::Rc;

use ahash::AHashMap;

use super::registers::{RegisterError, RegisterPool, RegisterStack};
use crate::{
    ast::Ident,
    error::{CompileError, CompileErrorKind, CompileResult},
    location::SourceLocation,
};

/// Free variables of one function, uniquified by name: a given foreign
/// name maps to exactly one capture ID.
#[derive(Debug)]
pub struct CaptureTable {
    limit: usize,
    names: Vec<Rc<str>>,
    ids: AHashMap<Rc<str>, u32>,
}

impl CaptureTable {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            names: Vec::new(),
            ids: AHashMap::new(),
        }
    }

    /// Registers a new foreign name. The caller guarantees it is not
    /// present yet.
    pub fn add(&mut self, name: &Rc<str>) -> Option<u32> {
        if self.names.len() >= self.limit {
            return None;
        }
        let id = u32::try_from(self.names.len()).expect("capture table length fits u32");
        debug_assert!(!self.ids.contains_key(name));
        self.names.push(Rc::clone(name));
        self.ids.insert(Rc::clone(name), id);
        Some(id)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    #[must_use]
    pub fn names(&self) -> &[Rc<str>] {
        &self.names
    }
}

/// What an identifier resolved to inside one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRef {
    /// A named register of this function.
    Local(u8),
    /// A capture ID in this function's capture table.
    Foreign(u32),
}

/// Compilation state for one function body.
#[derive(Debug)]
pub struct FunctionScope {
    pool: RegisterPool,
    targets: RegisterStack,
    captures: CaptureTable,
}

impl FunctionScope {
    #[must_use]
    pub fn new(register_limit: usize, capture_limit: usize) -> Self {
        Self {
            pool: RegisterPool::new(register_limit),
            targets: RegisterStack::default(),
            captures: CaptureTable::new(capture_limit),
        }
    }

    /// Allocates a named register for a local variable declaration.
    pub fn create_local(&mut self, ident: &Ident) -> CompileResult<u8> {
        self.pool.allocate(Some(&ident.name)).map_err(|error| {
            let kind = match error {
                RegisterError::DuplicateName => {
                    CompileErrorKind::LocalVariableExists(ident.name.to_string())
                }
                RegisterError::Exhausted => CompileErrorKind::StackTooDeep,
            };
            CompileError::new(kind, ident.location.clone())
        })
    }

    /// Resolves a name within this function only: a named register first,
    /// then an existing capture.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<VariableRef> {
        if let Some(register) = self.pool.find(name) {
            return Some(VariableRef::Local(register));
        }
        self.captures.find(name).map(VariableRef::Foreign)
    }

    /// Adds a foreign name on first use from a nested function.
    pub fn add_foreign(&mut self, ident: &Ident) -> CompileResult<u32> {
        self.captures.add(&ident.name).ok_or_else(|| {
            CompileError::new(CompileErrorKind::CaptureTableTooLarge, ident.location.clone())
        })
    }

    pub fn mark_register(&mut self, register: u8) {
        self.pool.mark(register);
    }

    pub fn push_target(&mut self, location: &SourceLocation, register: Option<u8>) -> CompileResult<u8> {
        self.targets.push(&mut self.pool, register).map_err(|_| {
            CompileError::new(CompileErrorKind::StackTooDeep, location.clone())
        })
    }

    pub fn pop_target(&mut self) -> u8 {
        self.targets.pop(&mut self.pool)
    }

    #[must_use]
    pub fn peek_target(&self) -> u8 {
        self.targets.peek()
    }

    #[must_use]
    pub fn next_register(&self) -> usize {
        self.pool.next_register()
    }

    #[must_use]
    pub fn register_count(&self) -> usize {
        self.pool.register_count()
    }

    pub fn enter_block(&mut self) -> usize {
        self.pool.enter_scope()
    }

    pub fn exit_block(&mut self) {
        self.pool.exit_scope();
    }

    #[must_use]
    pub fn has_marks_at_or_above(&self, base: usize) -> bool {
        self.pool.has_marks_at_or_above(base)
    }

    #[must_use]
    pub fn foreign_names(&self) -> &[Rc<str>] {
        self.captures.names()
    }
}
