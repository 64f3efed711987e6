//! The compiler's register allocator.
//!
//! `RegisterPool` models the function's register file as layered
//! sub-scopes: each scope starts allocating at its parent's high-water
//! mark and releases everything on exit. Named slots hold local variables,
//! anonymous slots hold expression temporaries (freed in LIFO order).
//! A slot can be marked as captured by a nested closure; the generator
//! checks marks on scope exit to decide whether to emit
//! `KILL_ORIGINAL_CAPTURES`.
//!
//! `RegisterStack` is the evaluation-target discipline: each pending
//! expression records which register will receive its value and whether
//! that register must be freed once the value is consumed.

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

/// Raised by allocation; the function scope converts these into located
/// compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The pool limit was hit ("stack too deep").
    Exhausted,
    /// A named slot with this name already exists in the scope.
    DuplicateName,
}

#[derive(Debug)]
struct ScopeFrame {
    /// First register id this scope allocates.
    base: usize,
    /// Allocation records in order; `None` marks an anonymous temporary.
    records: Vec<Option<Rc<str>>>,
    names: AHashMap<Rc<str>, u8>,
}

#[derive(Debug)]
pub struct RegisterPool {
    limit: usize,
    highest_used: Option<u8>,
    scopes: Vec<ScopeFrame>,
    marked: AHashSet<u8>,
}

impl RegisterPool {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            highest_used: None,
            scopes: vec![ScopeFrame {
                base: 0,
                records: Vec::new(),
                names: AHashMap::new(),
            }],
            marked: AHashSet::new(),
        }
    }

    fn current(&self) -> &ScopeFrame {
        self.scopes.last().expect("pool always has a root scope")
    }

    fn current_mut(&mut self) -> &mut ScopeFrame {
        self.scopes.last_mut().expect("pool always has a root scope")
    }

    /// The register the next allocation would take.
    #[must_use]
    pub fn next_register(&self) -> usize {
        let scope = self.current();
        scope.base + scope.records.len()
    }

    /// Allocates the next slot, binding `name` when given.
    pub fn allocate(&mut self, name: Option<&Rc<str>>) -> Result<u8, RegisterError> {
        let id = self.next_register();
        if id >= self.limit {
            return Err(RegisterError::Exhausted);
        }
        let id = u8::try_from(id).expect("pool limit fits u8 range");

        let scope = self.current_mut();
        match name {
            None => scope.records.push(None),
            Some(name) => {
                if scope.names.contains_key(name) {
                    return Err(RegisterError::DuplicateName);
                }
                // named locals are declared at statement boundaries, never
                // while an expression temporary is outstanding
                debug_assert!(!matches!(scope.records.last(), Some(None)));
                scope.records.push(Some(Rc::clone(name)));
                scope.names.insert(Rc::clone(name), id);
            }
        }

        if self.highest_used.is_none_or(|highest| id > highest) {
            self.highest_used = Some(id);
        }
        Ok(id)
    }

    /// Releases the most recent allocation, which must be anonymous.
    pub fn free_unnamed(&mut self) {
        let record = self.current_mut().records.pop();
        debug_assert!(matches!(record, Some(None)), "freed a named or absent register");
    }

    /// Resolves a name against this scope chain.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<u8> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }

    /// Opens a sub-scope and returns the first register it will use.
    pub fn enter_scope(&mut self) -> usize {
        let base = self.next_register();
        self.scopes.push(ScopeFrame {
            base,
            records: Vec::new(),
            names: AHashMap::new(),
        });
        base
    }

    /// Closes the current sub-scope, releasing its registers and marks.
    pub fn exit_scope(&mut self) {
        let scope = self.scopes.pop().expect("unbalanced scope exit");
        debug_assert!(!self.scopes.is_empty(), "root scope must remain");
        self.marked.retain(|&register| usize::from(register) < scope.base);
    }

    /// Flags a register as captured by a nested closure.
    pub fn mark(&mut self, register: u8) {
        self.marked.insert(register);
    }

    /// True when any register at or above `base` carries a capture mark.
    #[must_use]
    pub fn has_marks_at_or_above(&self, base: usize) -> bool {
        self.marked.iter().any(|&register| usize::from(register) >= base)
    }

    /// High-water mark: how many registers the function needs.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.highest_used.map_or(0, |highest| usize::from(highest) + 1)
    }
}

#[derive(Debug, Clone, Copy)]
struct TargetEntry {
    register: u8,
    /// Whether the register was anonymously allocated for this entry and
    /// must be freed when it is popped.
    owned: bool,
}

/// The evaluation-target stack. Every expression visitor leaves exactly
/// one entry; every statement visitor leaves none.
#[derive(Debug, Default)]
pub struct RegisterStack {
    entries: Vec<TargetEntry>,
}

impl RegisterStack {
    /// Records the target for a pending expression: an existing register
    /// (a named local, not freed on pop) or a fresh anonymous temporary.
    pub fn push(&mut self, pool: &mut RegisterPool, register: Option<u8>) -> Result<u8, RegisterError> {
        let entry = match register {
            Some(register) => TargetEntry { register, owned: false },
            None => TargetEntry {
                register: pool.allocate(None)?,
                owned: true,
            },
        };
        self.entries.push(entry);
        Ok(entry.register)
    }

    pub fn pop(&mut self, pool: &mut RegisterPool) -> u8 {
        let entry = self.entries.pop().expect("target stack underflow");
        if entry.owned {
            debug_assert_eq!(usize::from(entry.register) + 1, pool.next_register());
            pool.free_unnamed();
        }
        entry.register
    }

    #[must_use]
    pub fn peek(&self) -> u8 {
        self.entries.last().expect("target stack is empty").register
    }
}
