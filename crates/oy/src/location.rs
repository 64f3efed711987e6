//! Source positions carried through tokens, AST nodes, bytecode and errors.

use std::{fmt, rc::Rc};

/// A position in a script source, 1-based.
///
/// The file name is shared (`Rc<str>`) because every token, AST node and
/// emitted instruction carries a location; cloning must stay cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: Rc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
