//! The bytecode generator: a single-pass walk over the AST.
//!
//! Expressions follow the target-stack discipline: every expression
//! visitor leaves exactly one register on the stack (a fresh anonymous
//! temporary, or the home register of a named local), every statement
//! visitor leaves none. Assignment targets are compiled by re-visiting
//! the target expression in l-value mode, which stores from the current
//! stack top instead of producing a value.
//!
//! Forward jumps are emitted with a zero immediate and backpatched once
//! the target offset is known; `break`/`continue` and switch fall-through
//! collect their jump offsets in the active loop/switch context.

use std::mem;

use super::{
    code::{CaptureDescriptor, Executable, FunctionPrototype},
    op::{BuiltinFn, Conversion, Opcode},
    scope::{FunctionScope, VariableRef},
};
use crate::{
    ast::{
        ArrayElement, BinaryOp, BuiltinName, ConversionOp, Expr, FunctionLiteral, Ident, PostfixOp, PrefixOp, Stmt,
        StructureField, SwitchClause,
    },
    error::{CompileError, CompileErrorKind, CompileResult},
    location::SourceLocation,
};

/// Registers available to one function. Operands are single bytes, so
/// this is also the hard encoding limit.
pub const REGISTER_POOL_SIZE: usize = 256;

const MAX_CAPTURES: usize = i32::MAX as usize;

#[derive(Debug, Default)]
struct GenContext {
    /// Set while re-visiting an assignment target in l-value mode.
    assigning: bool,
    breaks: Vec<usize>,
    continues: Vec<usize>,
    fallthroughs: Vec<usize>,
}

pub struct BytecodeGenerator {
    executable: Executable,
    /// One entry per function currently being compiled, innermost last.
    scopes: Vec<FunctionScope>,
    protos: Vec<FunctionPrototype>,
    contexts: Vec<GenContext>,
}

impl BytecodeGenerator {
    /// Compiles a parsed program into an executable. The program's own
    /// prototype always gets ID 0.
    pub fn generate(program: &FunctionLiteral) -> CompileResult<Executable> {
        let mut generator = Self {
            executable: Executable::new(),
            scopes: Vec::new(),
            protos: Vec::new(),
            contexts: Vec::new(),
        };
        generator.compile_function(program)?;
        Ok(generator.executable)
    }

    fn compile_function(&mut self, literal: &FunctionLiteral) -> CompileResult<usize> {
        let id = self.executable.reserve_prototype();

        let mut scope = FunctionScope::new(REGISTER_POOL_SIZE, MAX_CAPTURES);
        for parameter in &literal.parameters {
            scope.create_local(parameter)?;
        }
        for (parameter, _) in &literal.default_parameters {
            scope.create_local(parameter)?;
        }
        if let Some(rest) = &literal.rest_parameter {
            scope.create_local(rest)?;
        }

        self.scopes.push(scope);
        self.protos.push(FunctionPrototype::new(
            literal.parameters.len(),
            literal.default_parameters.len(),
            literal.rest_parameter.is_some(),
        ));
        self.contexts.push(GenContext::default());

        let mut returned = false;
        for statement in &literal.body {
            self.statement(statement)?;
            if matches!(statement, Stmt::Return { .. }) {
                returned = true;
                break;
            }
        }
        if !returned {
            let location = literal.body_location.clone();
            let register = self.scope_mut().push_target(&location, None)?;
            self.emit(&location, Opcode::LoadVoid, register, 0, 0, None)?;
            let register = self.scope_mut().pop_target();
            self.emit(&location, Opcode::Return, register, 0, 0, None)?;
        }

        self.contexts.pop();
        let scope = self.scopes.pop().expect("function scope is balanced");
        let mut proto = self.protos.pop().expect("prototype stack is balanced");
        proto.set_register_count(scope.register_count());

        // resolve this function's free variables against the enclosing
        // scope; name resolution already chained the entries through
        for name in scope.foreign_names() {
            let encloser = self.scopes.last().expect("nested function has an encloser");
            let descriptor = match encloser.lookup(name).expect("chained foreign name resolves") {
                VariableRef::Local(register) => CaptureDescriptor::Original(register),
                VariableRef::Foreign(capture) => {
                    CaptureDescriptor::Inherited(capture)
                }
            };
            proto.push_capture(descriptor);
        }

        self.executable.install_prototype(id, proto);
        Ok(id)
    }

    // ----------------------------------------------------------------
    // statements

    fn statement(&mut self, statement: &Stmt) -> CompileResult<()> {
        match statement {
            Stmt::Null { .. } => Ok(()),
            Stmt::Block { location, statements } => self.block(location, statements),
            Stmt::Auto { variables, .. } => self.auto(variables),
            Stmt::Return { location, expression } => self.return_(location, expression.as_ref()),
            Stmt::Delete { location, container, key } => self.delete(location, container, key),
            Stmt::Break { location } => {
                let offset = self.emit(location, Opcode::Jump, 0, 0, 0, Some(0))?;
                self.ctx_mut().breaks.push(offset);
                Ok(())
            }
            Stmt::Continue { location } => {
                let offset = self.emit(location, Opcode::Jump, 0, 0, 0, Some(0))?;
                self.ctx_mut().continues.push(offset);
                Ok(())
            }
            Stmt::If {
                location,
                initialization,
                condition,
                then_body,
                else_body,
            } => self.if_(location, initialization.as_deref(), condition, then_body, else_body.as_deref()),
            Stmt::Switch {
                location,
                initialization,
                discriminant,
                clauses,
            } => self.switch(location, initialization.as_deref(), discriminant, clauses),
            Stmt::While {
                location,
                initialization,
                condition,
                body,
            } => self.while_(location, initialization.as_deref(), condition, body),
            Stmt::DoWhile {
                location,
                body,
                initialization,
                condition,
            } => self.do_while(location, body, initialization.as_deref(), condition),
            Stmt::For {
                location,
                initialization,
                condition,
                iteration,
                body,
            } => self.for_(
                location,
                initialization.as_deref(),
                condition.as_ref(),
                iteration.as_ref(),
                body,
            ),
            Stmt::Foreach {
                location,
                key,
                value,
                container,
                body,
            } => self.foreach(location, key, value.as_ref(), container, body),
            Stmt::Expression { expression, .. } => {
                self.expression(expression)?;
                self.scope_mut().pop_target();
                Ok(())
            }
        }
    }

    fn block(&mut self, location: &SourceLocation, statements: &[Stmt]) -> CompileResult<()> {
        let base = self.scope_mut().enter_block();
        for statement in statements {
            self.statement(statement)?;
        }
        self.close_block(location, base)
    }

    /// Emits `KILL_ORIGINAL_CAPTURES` when any register of the exiting
    /// scope was captured, then releases the scope.
    fn close_block(&mut self, location: &SourceLocation, base: usize) -> CompileResult<()> {
        if self.scope().has_marks_at_or_above(base) {
            let first = u8::try_from(base).expect("a marked register implies the base is in range");
            self.emit(location, Opcode::KillOriginalCaptures, first, 0, 0, None)?;
        }
        self.scope_mut().exit_block();
        Ok(())
    }

    fn auto(&mut self, variables: &[(Ident, Option<Expr>)]) -> CompileResult<()> {
        for (name, value) in variables {
            match value {
                None => {
                    let register = self.scope_mut().create_local(name)?;
                    self.emit(&name.location, Opcode::LoadVoid, register, 0, 0, None)?;
                }
                Some(value) => {
                    self.expression(value)?;
                    let source = self.scope_mut().pop_target();
                    let home = self.scope_mut().create_local(name)?;
                    if home != source {
                        self.emit(&name.location, Opcode::Move, home, source, 0, None)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn return_(&mut self, location: &SourceLocation, expression: Option<&Expr>) -> CompileResult<()> {
        match expression {
            None => {
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadVoid, register, 0, 0, None)?;
            }
            Some(expression) => self.expression(expression)?,
        }
        let register = self.scope_mut().pop_target();
        self.emit(location, Opcode::Return, register, 0, 0, None)?;
        Ok(())
    }

    fn delete(&mut self, location: &SourceLocation, container: &Expr, key: &Expr) -> CompileResult<()> {
        self.expression(container)?;
        self.expression(key)?;
        let key_register = self.scope_mut().pop_target();
        let container_register = self.scope_mut().pop_target();
        self.emit(location, Opcode::ClearSlot, 0, container_register, key_register, None)?;
        Ok(())
    }

    /// Compiles the optional parenthesized `auto` initializer of
    /// if/switch/while/do-while, opening a sub-scope around the whole
    /// statement when present. Returns the scope base to close with.
    fn open_init_scope(&mut self, initialization: Option<&Stmt>) -> CompileResult<Option<usize>> {
        match initialization {
            None => Ok(None),
            Some(initialization) => {
                let base = self.scope_mut().enter_block();
                self.statement(initialization)?;
                Ok(Some(base))
            }
        }
    }

    fn close_init_scope(&mut self, location: &SourceLocation, base: Option<usize>) -> CompileResult<()> {
        match base {
            None => Ok(()),
            Some(base) => self.close_block(location, base),
        }
    }

    fn if_(
        &mut self,
        location: &SourceLocation,
        initialization: Option<&Stmt>,
        condition: &Expr,
        then_body: &Stmt,
        else_body: Option<&Stmt>,
    ) -> CompileResult<()> {
        let scope_base = self.open_init_scope(initialization)?;

        self.expression(condition)?;
        let condition_register = self.scope_mut().pop_target();
        let skip_then = self.emit(location, Opcode::JumpIfFalse, condition_register, 0, 0, Some(0))?;

        self.statement(then_body)?;

        match else_body {
            Some(else_body) => {
                let skip_else = self.emit(location, Opcode::Jump, 0, 0, 0, Some(0))?;
                self.patch(skip_then, self.next_offset());
                self.statement(else_body)?;
                self.patch(skip_else, self.next_offset());
            }
            None => self.patch(skip_then, self.next_offset()),
        }

        self.close_init_scope(location, scope_base)
    }

    fn switch(
        &mut self,
        location: &SourceLocation,
        initialization: Option<&Stmt>,
        discriminant: &Expr,
        clauses: &[SwitchClause],
    ) -> CompileResult<()> {
        let scope_base = self.open_init_scope(initialization)?;

        let saved_breaks = mem::take(&mut self.ctx_mut().breaks);
        let saved_fallthroughs = mem::take(&mut self.ctx_mut().fallthroughs);

        // the discriminant stays live on the target stack across clauses
        self.expression(discriminant)?;
        for clause in clauses {
            self.switch_clause(clause)?;
        }
        self.scope_mut().pop_target();

        let exit = self.next_offset();
        for offset in mem::take(&mut self.ctx_mut().breaks) {
            self.patch(offset, exit);
        }
        for offset in mem::take(&mut self.ctx_mut().fallthroughs) {
            self.patch(offset, exit);
        }
        let ctx = self.ctx_mut();
        ctx.breaks = saved_breaks;
        ctx.fallthroughs = saved_fallthroughs;

        self.close_init_scope(location, scope_base)
    }

    fn switch_clause(&mut self, clause: &SwitchClause) -> CompileResult<()> {
        let Some(label) = &clause.label else {
            // default clause: no label test, but a preceding clause still
            // falls through into this body
            let body = self.next_offset();
            for offset in mem::take(&mut self.ctx_mut().fallthroughs) {
                self.patch(offset, body);
            }
            for statement in &clause.statements {
                self.statement(statement)?;
            }
            return Ok(());
        };

        self.expression(label)?;
        let label_register = self.scope_mut().pop_target();
        let discriminant_register = self.scope().peek_target();
        let result = self.scope_mut().push_target(&clause.location, None)?;
        self.emit(
            &clause.location,
            Opcode::Equal,
            result,
            label_register,
            discriminant_register,
            None,
        )?;
        let result = self.scope_mut().pop_target();
        let skip_clause = self.emit(&clause.location, Opcode::JumpIfFalse, result, 0, 0, Some(0))?;

        // previous clauses fall through to this body, past the label test
        let body = self.next_offset();
        for offset in mem::take(&mut self.ctx_mut().fallthroughs) {
            self.patch(offset, body);
        }

        for statement in &clause.statements {
            self.statement(statement)?;
        }

        let fallthrough = self.emit(&clause.location, Opcode::Jump, 0, 0, 0, Some(0))?;
        self.ctx_mut().fallthroughs = vec![fallthrough];
        self.patch(skip_clause, self.next_offset());
        Ok(())
    }

    fn enter_loop(&mut self) -> (Vec<usize>, Vec<usize>) {
        let ctx = self.ctx_mut();
        (mem::take(&mut ctx.breaks), mem::take(&mut ctx.continues))
    }

    fn exit_loop(&mut self, saved: (Vec<usize>, Vec<usize>), break_target: usize, continue_target: usize) {
        for offset in mem::take(&mut self.ctx_mut().breaks) {
            self.patch(offset, break_target);
        }
        for offset in mem::take(&mut self.ctx_mut().continues) {
            self.patch(offset, continue_target);
        }
        let ctx = self.ctx_mut();
        ctx.breaks = saved.0;
        ctx.continues = saved.1;
    }

    fn while_(
        &mut self,
        location: &SourceLocation,
        initialization: Option<&Stmt>,
        condition: &Expr,
        body: &Stmt,
    ) -> CompileResult<()> {
        let scope_base = self.open_init_scope(initialization)?;
        let saved = self.enter_loop();

        let retry = self.next_offset();
        self.expression(condition)?;
        let condition_register = self.scope_mut().pop_target();
        let exit_jump = self.emit(location, Opcode::JumpIfFalse, condition_register, 0, 0, Some(0))?;
        self.ctx_mut().breaks.push(exit_jump);

        self.statement(body)?;
        self.emit_jump_to(location, retry)?;

        self.exit_loop(saved, self.next_offset(), retry);
        self.close_init_scope(location, scope_base)
    }

    fn do_while(
        &mut self,
        location: &SourceLocation,
        body: &Stmt,
        initialization: Option<&Stmt>,
        condition: &Expr,
    ) -> CompileResult<()> {
        let scope_base = self.open_init_scope(initialization)?;
        let saved = self.enter_loop();

        let retry = self.next_offset();
        self.statement(body)?;

        let test = self.next_offset();
        self.expression(condition)?;
        let condition_register = self.scope_mut().pop_target();
        let exit_jump = self.emit(location, Opcode::JumpIfFalse, condition_register, 0, 0, Some(0))?;
        self.ctx_mut().breaks.push(exit_jump);
        self.emit_jump_to(location, retry)?;

        self.exit_loop(saved, self.next_offset(), test);
        self.close_init_scope(location, scope_base)
    }

    fn for_(
        &mut self,
        location: &SourceLocation,
        initialization: Option<&Stmt>,
        condition: Option<&Expr>,
        iteration: Option<&Expr>,
        body: &Stmt,
    ) -> CompileResult<()> {
        // only an `auto` initializer introduces a scope; a plain
        // expression initializer does not declare anything
        let scope_base = match initialization {
            Some(initialization @ Stmt::Auto { .. }) => {
                let base = self.scope_mut().enter_block();
                self.statement(initialization)?;
                Some(base)
            }
            Some(initialization) => {
                self.statement(initialization)?;
                None
            }
            None => None,
        };
        let saved = self.enter_loop();

        let retry = self.next_offset();
        if let Some(condition) = condition {
            self.expression(condition)?;
            let condition_register = self.scope_mut().pop_target();
            let exit_jump = self.emit(location, Opcode::JumpIfFalse, condition_register, 0, 0, Some(0))?;
            self.ctx_mut().breaks.push(exit_jump);
        }

        self.statement(body)?;
        if let Some(iteration) = iteration {
            self.expression(iteration)?;
            self.scope_mut().pop_target();
        }
        self.emit_jump_to(location, retry)?;

        self.exit_loop(saved, self.next_offset(), retry);
        self.close_init_scope(location, scope_base)
    }

    fn foreach(
        &mut self,
        location: &SourceLocation,
        key: &Ident,
        value: Option<&Ident>,
        container: &Expr,
        body: &Stmt,
    ) -> CompileResult<()> {
        let base = self.scope_mut().enter_block();

        let key_register = self.scope_mut().create_local(key)?;
        let value_register = match value {
            Some(value) => self.scope_mut().create_local(value)?,
            // single-variable form: the value still needs a slot for ITERATE
            None => self.scope_mut().push_target(location, None)?,
        };

        self.expression(container)?;
        let container_register = self.scope_mut().pop_target();
        let iterator_register = self.scope_mut().push_target(location, None)?;
        self.emit(location, Opcode::NewIterator, iterator_register, container_register, 0, None)?;

        let saved = self.enter_loop();
        let retry = self.next_offset();
        let exit_jump = self.emit(location, Opcode::JumpIfFalse, iterator_register, 0, 0, Some(0))?;
        self.ctx_mut().breaks.push(exit_jump);
        self.emit(location, Opcode::Iterate, key_register, value_register, iterator_register, None)?;

        self.statement(body)?;
        self.emit_jump_to(location, retry)?;
        self.exit_loop(saved, self.next_offset(), retry);

        // release the loop-state targets before the scope closes
        self.scope_mut().pop_target();
        if value.is_none() {
            self.scope_mut().pop_target();
        }
        self.close_block(location, base)
    }

    // ----------------------------------------------------------------
    // expressions

    fn expression(&mut self, expression: &Expr) -> CompileResult<()> {
        if self.ctx().assigning {
            let valid = matches!(expression, Expr::Identifier(_))
                || matches!(expression, Expr::Binary { op, .. } if op.is_access());
            if !valid {
                return Err(CompileError::new(
                    CompileErrorKind::LvalueRequired,
                    expression.location().clone(),
                ));
            }
        }

        match expression {
            Expr::Null { location } => {
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadNull, register, 0, 0, None)?;
            }
            Expr::Boolean { location, value } => {
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadBoolean, register, u8::from(*value), 0, None)?;
            }
            Expr::Integer { location, value } => self.integer_literal(location, *value)?,
            Expr::Float { location, value } => self.float_literal(location, *value)?,
            Expr::Str { location, value } => {
                let constant = self.executable.add_string_constant(location, value)?;
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadConstant, register, 0, 0, Some(constant))?;
            }
            Expr::Identifier(ident) => self.identifier(ident)?,
            Expr::ArrayLiteral { location, elements } => self.array_literal(location, elements)?,
            Expr::StructureLiteral { location, fields } => self.structure_literal(location, fields)?,
            Expr::FunctionLiteral { location, function } => self.function_literal(location, function)?,
            Expr::Builtin { location, name } => {
                let builtin = match name {
                    BuiltinName::Trace => BuiltinFn::Trace,
                    BuiltinName::Require => BuiltinFn::Require,
                };
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadBuiltinFunction, register, builtin as u8, 0, None)?;
            }
            Expr::Convert { location, op, operand } => {
                self.expression(operand)?;
                let source = self.scope_mut().pop_target();
                let conversion = match op {
                    ConversionOp::Bool => Conversion::Bool,
                    ConversionOp::Int => Conversion::Int,
                    ConversionOp::Float => Conversion::Float,
                    ConversionOp::Str => Conversion::Str,
                    ConversionOp::Sizeof => Conversion::Sizeof,
                    ConversionOp::Typeof => Conversion::Typeof,
                };
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::Convert, register, source, conversion as u8, None)?;
            }
            Expr::Prefix { location, op, operand } => self.prefix(location, *op, operand)?,
            Expr::Postfix { location, op, operand } => self.postfix(location, *op, operand)?,
            Expr::Binary {
                location,
                op,
                left,
                right,
            } => self.binary(location, *op, left, right)?,
            Expr::Ternary {
                location,
                condition,
                then_value,
                else_value,
            } => self.ternary(location, condition, then_value, else_value)?,
            Expr::Call { location, operands } => self.call(location, operands)?,
        }
        Ok(())
    }

    fn integer_literal(&mut self, location: &SourceLocation, value: i64) -> CompileResult<()> {
        if let Ok(immediate) = i32::try_from(value) {
            let register = self.scope_mut().push_target(location, None)?;
            self.emit(location, Opcode::LoadInteger, register, 0, 0, Some(immediate))?;
        } else {
            let constant = self.executable.add_integer_constant(location, value)?;
            let register = self.scope_mut().push_target(location, None)?;
            self.emit(location, Opcode::LoadConstant, register, 0, 0, Some(constant))?;
        }
        Ok(())
    }

    fn float_literal(&mut self, location: &SourceLocation, value: f64) -> CompileResult<()> {
        let constant = self.executable.add_float_constant(location, value)?;
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(location, Opcode::LoadConstant, register, 0, 0, Some(constant))?;
        Ok(())
    }

    fn identifier(&mut self, ident: &Ident) -> CompileResult<()> {
        let assigning = self.ctx().assigning;
        match self.find_variable(ident)? {
            VariableRef::Local(home) => {
                if assigning {
                    let source = self.scope().peek_target();
                    if home != source {
                        self.emit(&ident.location, Opcode::Move, home, source, 0, None)?;
                    }
                } else {
                    // reading a local needs no code, its home register is
                    // the value
                    self.scope_mut().push_target(&ident.location, Some(home))?;
                }
            }
            VariableRef::Foreign(capture) => {
                let capture = i32::try_from(capture).expect("capture table length capped");
                if assigning {
                    let source = self.scope().peek_target();
                    self.emit(&ident.location, Opcode::SetCapture, source, 0, 0, Some(capture))?;
                } else {
                    let register = self.scope_mut().push_target(&ident.location, None)?;
                    self.emit(&ident.location, Opcode::GetCapture, register, 0, 0, Some(capture))?;
                }
            }
        }
        Ok(())
    }

    fn array_literal(&mut self, location: &SourceLocation, elements: &[ArrayElement]) -> CompileResult<()> {
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(location, Opcode::NewArray, register, 0, 0, None)?;
        let array_register = self.scope().peek_target();

        let mut implicit_index: i32 = 0;
        for element in elements {
            match &element.index {
                None => {
                    let value_location = element.value.location().clone();
                    let register = self.scope_mut().push_target(&value_location, None)?;
                    self.emit(&value_location, Opcode::LoadInteger, register, 0, 0, Some(implicit_index))?;
                    implicit_index += 1;
                }
                Some(index) => self.expression(index)?,
            }
            self.expression(&element.value)?;
            let value_register = self.scope_mut().pop_target();
            let index_register = self.scope_mut().pop_target();
            let at = element.index.as_ref().map_or_else(|| element.value.location(), Expr::location);
            self.emit(
                at,
                Opcode::SetSlot,
                value_register,
                array_register,
                index_register,
                None,
            )?;
        }
        Ok(())
    }

    fn structure_literal(&mut self, location: &SourceLocation, fields: &[StructureField]) -> CompileResult<()> {
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(location, Opcode::NewStructure, register, 0, 0, None)?;
        let structure_register = self.scope().peek_target();

        for field in fields {
            self.expression(&field.key)?;
            self.expression(&field.value)?;
            let value_register = self.scope_mut().pop_target();
            let key_register = self.scope_mut().pop_target();
            self.emit(
                field.key.location(),
                Opcode::SetSlot,
                value_register,
                structure_register,
                key_register,
                None,
            )?;
        }
        Ok(())
    }

    fn function_literal(&mut self, location: &SourceLocation, function: &FunctionLiteral) -> CompileResult<()> {
        // default-argument values are evaluated here, in the enclosing
        // function, into a contiguous register range
        let start = self.scope().next_register();
        for (_, default) in &function.default_parameters {
            self.expression(default)?;
            self.ensure_temporary(default.location())?;
        }
        let end = self.scope().next_register();

        let prototype_id = self.compile_function(function)?;

        for _ in start..end {
            self.scope_mut().pop_target();
        }
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(
            location,
            Opcode::NewClosure,
            register,
            self.operand_register(location, start)?,
            self.operand_register(location, end)?,
            Some(i32::try_from(prototype_id).expect("prototype count fits immediate")),
        )?;
        Ok(())
    }

    fn prefix(&mut self, location: &SourceLocation, op: PrefixOp, operand: &Expr) -> CompileResult<()> {
        match op {
            PrefixOp::Increment | PrefixOp::Decrement => {
                self.expression(operand)?;

                let one = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LoadInteger, one, 0, 0, Some(1))?;
                let one = self.scope_mut().pop_target();
                let target = self.scope().peek_target();

                let opcode = if op == PrefixOp::Increment {
                    Opcode::Add
                } else {
                    Opcode::Subtract
                };
                self.emit(location, opcode, target, target, one, None)?;
                self.assign_to(operand)?;
            }
            PrefixOp::Minus => match operand {
                // fold negation of a literal into the constant itself
                Expr::Integer { value, .. } => self.integer_literal(location, value.wrapping_neg())?,
                Expr::Float { value, .. } => self.float_literal(location, -value)?,
                _ => {
                    self.expression(operand)?;
                    let source = self.scope_mut().pop_target();
                    let register = self.scope_mut().push_target(location, None)?;
                    self.emit(location, Opcode::Negate, register, source, 0, None)?;
                }
            },
            PrefixOp::Plus => self.expression(operand)?,
            PrefixOp::LogicalNot => {
                self.expression(operand)?;
                let source = self.scope_mut().pop_target();
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::LogicalNot, register, source, 0, None)?;
            }
            PrefixOp::BitwiseNot => {
                self.expression(operand)?;
                let source = self.scope_mut().pop_target();
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::BitwiseNot, register, source, 0, None)?;
            }
        }
        Ok(())
    }

    fn postfix(&mut self, location: &SourceLocation, op: PostfixOp, operand: &Expr) -> CompileResult<()> {
        self.expression(operand)?;
        // keep the pre-value in its own temporary, it is the result
        self.ensure_temporary(location)?;

        let one = self.scope_mut().push_target(location, None)?;
        self.emit(location, Opcode::LoadInteger, one, 0, 0, Some(1))?;
        let one = self.scope_mut().pop_target();
        let pre_value = self.scope().peek_target();

        let opcode = if op == PostfixOp::Increment {
            Opcode::Add
        } else {
            Opcode::Subtract
        };
        let incremented = self.scope_mut().push_target(location, None)?;
        self.emit(location, opcode, incremented, pre_value, one, None)?;

        self.assign_to(operand)?;
        self.scope_mut().pop_target();
        Ok(())
    }

    fn binary(&mut self, location: &SourceLocation, op: BinaryOp, left: &Expr, right: &Expr) -> CompileResult<()> {
        if op == BinaryOp::Comma {
            self.expression(left)?;
            self.scope_mut().pop_target();
            return self.expression(right);
        }

        if op.is_assignment() {
            match compound_opcode(op) {
                None => self.expression(right)?,
                Some(opcode) => {
                    self.expression(left)?;
                    self.expression(right)?;
                    let rhs = self.scope_mut().pop_target();
                    let lhs = self.scope().peek_target();
                    self.emit(location, opcode, lhs, lhs, rhs, None)?;
                }
            }
            return self.assign_to(left);
        }

        if matches!(op, BinaryOp::LogicalOr | BinaryOp::LogicalAnd) {
            let jump_opcode = if op == BinaryOp::LogicalOr {
                Opcode::JumpIfTrue
            } else {
                Opcode::JumpIfFalse
            };
            self.expression(left)?;
            self.ensure_temporary(location)?;
            let register = self.scope_mut().pop_target();
            let short_circuit = self.emit(location, jump_opcode, register, 0, 0, Some(0))?;
            // the right side lands in the same temporary
            self.expression(right)?;
            self.ensure_temporary(location)?;
            self.patch(short_circuit, self.next_offset());
            return Ok(());
        }

        if op.is_access() {
            if self.ctx().assigning {
                self.rvalue(left)?;
                self.rvalue(right)?;
                let key = self.scope_mut().pop_target();
                let container = self.scope_mut().pop_target();
                let value = self.scope().peek_target();
                self.emit(location, Opcode::SetSlot, value, container, key, None)?;
            } else {
                self.expression(left)?;
                self.expression(right)?;
                let key = self.scope_mut().pop_target();
                let container = self.scope_mut().pop_target();
                let register = self.scope_mut().push_target(location, None)?;
                self.emit(location, Opcode::GetSlot, register, container, key, None)?;
            }
            return Ok(());
        }

        let opcode = plain_opcode(op);
        self.expression(left)?;
        self.expression(right)?;
        let rhs = self.scope_mut().pop_target();
        let lhs = self.scope_mut().pop_target();
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(location, opcode, register, lhs, rhs, None)?;
        Ok(())
    }

    fn ternary(
        &mut self,
        location: &SourceLocation,
        condition: &Expr,
        then_value: &Expr,
        else_value: &Expr,
    ) -> CompileResult<()> {
        self.expression(condition)?;
        let condition_register = self.scope_mut().pop_target();
        let skip_then = self.emit(location, Opcode::JumpIfFalse, condition_register, 0, 0, Some(0))?;

        self.expression(then_value)?;
        self.ensure_temporary(location)?;
        let skip_else = self.emit(location, Opcode::Jump, 0, 0, 0, Some(0))?;
        self.patch(skip_then, self.next_offset());

        // both branches produce their value in the same register
        self.scope_mut().pop_target();
        self.expression(else_value)?;
        self.ensure_temporary(location)?;
        self.patch(skip_else, self.next_offset());
        Ok(())
    }

    fn call(&mut self, location: &SourceLocation, operands: &[Expr]) -> CompileResult<()> {
        // callee and arguments go into a contiguous register range
        let start = self.scope().next_register();
        for operand in operands {
            self.expression(operand)?;
            self.ensure_temporary(operand.location())?;
        }
        let end = self.scope().next_register();

        for _ in start..end {
            self.scope_mut().pop_target();
        }
        let register = self.scope_mut().push_target(location, None)?;
        self.emit(
            location,
            Opcode::Call,
            register,
            self.operand_register(location, start)?,
            self.operand_register(location, end)?,
            None,
        )?;
        Ok(())
    }

    // ----------------------------------------------------------------
    // helpers

    /// Re-visits an assignment target in l-value mode; the value to store
    /// is the current top of the target stack.
    fn assign_to(&mut self, target: &Expr) -> CompileResult<()> {
        let saved = self.ctx().assigning;
        self.ctx_mut().assigning = true;
        let result = self.expression(target);
        self.ctx_mut().assigning = saved;
        result
    }

    /// Evaluates a sub-expression of an l-value (container, key) as a
    /// plain value.
    fn rvalue(&mut self, expression: &Expr) -> CompileResult<()> {
        let saved = self.ctx().assigning;
        self.ctx_mut().assigning = false;
        let result = self.expression(expression);
        self.ctx_mut().assigning = saved;
        result
    }

    /// Forces the current target into an owned temporary, moving out of a
    /// named register if needed. Used wherever a value must survive in a
    /// register the expression owns (call argument ranges, short-circuit
    /// and ternary joins, postfix pre-values).
    fn ensure_temporary(&mut self, location: &SourceLocation) -> CompileResult<()> {
        let current = self.scope_mut().pop_target();
        let temporary = self.scope_mut().push_target(location, None)?;
        if temporary != current {
            self.emit(location, Opcode::Move, temporary, current, 0, None)?;
        }
        Ok(())
    }

    /// Resolves an identifier: local to this function, or foreign through
    /// the chain of enclosing functions. A foreign resolution creates a
    /// capture entry in every function between the owner and here, and
    /// marks the owner's register as captured.
    fn find_variable(&mut self, ident: &Ident) -> CompileResult<VariableRef> {
        let innermost = self.scopes.len() - 1;
        if let Some(found) = self.scopes[innermost].lookup(&ident.name) {
            return Ok(found);
        }

        let mut owner = None;
        for depth in (0..innermost).rev() {
            if let Some(found) = self.scopes[depth].lookup(&ident.name) {
                owner = Some((depth, found));
                break;
            }
        }
        let Some((depth, found)) = owner else {
            return Err(CompileError::new(
                CompileErrorKind::VariableNotFound(ident.name.to_string()),
                ident.location.clone(),
            ));
        };

        if let VariableRef::Local(register) = found {
            self.scopes[depth].mark_register(register);
        }

        let mut resolved = found;
        for chain_depth in depth + 1..=innermost {
            let capture = self.scopes[chain_depth].add_foreign(ident)?;
            resolved = VariableRef::Foreign(capture);
        }
        Ok(resolved)
    }

    fn scope(&self) -> &FunctionScope {
        self.scopes.last().expect("a function scope is active")
    }

    fn scope_mut(&mut self) -> &mut FunctionScope {
        self.scopes.last_mut().expect("a function scope is active")
    }

    fn ctx(&self) -> &GenContext {
        self.contexts.last().expect("a generator context is active")
    }

    fn ctx_mut(&mut self) -> &mut GenContext {
        self.contexts.last_mut().expect("a generator context is active")
    }

    fn emit(
        &mut self,
        location: &SourceLocation,
        opcode: Opcode,
        a: u8,
        b: u8,
        c: u8,
        immediate: Option<i32>,
    ) -> CompileResult<usize> {
        self.protos
            .last_mut()
            .expect("a prototype is being built")
            .add_instruction(location, opcode, a, b, c, immediate)
    }

    fn emit_jump_to(&mut self, location: &SourceLocation, target: usize) -> CompileResult<usize> {
        let target = i32::try_from(target).expect("bytecode offsets fit the immediate");
        self.emit(location, Opcode::Jump, 0, 0, 0, Some(target))
    }

    fn next_offset(&self) -> usize {
        self.protos.last().expect("a prototype is being built").next_offset()
    }

    fn patch(&mut self, offset: usize, target: usize) {
        let target = i32::try_from(target).expect("bytecode offsets fit the immediate");
        self.protos
            .last_mut()
            .expect("a prototype is being built")
            .patch_immediate(offset, target);
    }

    /// Encodes a register-range bound as an operand byte. The bound can
    /// only exceed the operand range when the pool is exhausted anyway.
    fn operand_register(&self, location: &SourceLocation, register: usize) -> CompileResult<u8> {
        u8::try_from(register)
            .map_err(|_| CompileError::new(CompileErrorKind::StackTooDeep, location.clone()))
    }
}

fn compound_opcode(op: BinaryOp) -> Option<Opcode> {
    let opcode = match op {
        BinaryOp::Assign => return None,
        BinaryOp::AddAssign => Opcode::Add,
        BinaryOp::SubtractAssign => Opcode::Subtract,
        BinaryOp::MultiplyAssign => Opcode::Multiply,
        BinaryOp::DivideAssign => Opcode::Divide,
        BinaryOp::ModuloAssign => Opcode::Modulo,
        BinaryOp::ShiftLeftAssign => Opcode::BitwiseShiftLeft,
        BinaryOp::ShiftRightAssign => Opcode::BitwiseShiftRight,
        BinaryOp::AndAssign => Opcode::BitwiseAnd,
        BinaryOp::XorAssign => Opcode::BitwiseXor,
        BinaryOp::OrAssign => Opcode::BitwiseOr,
        _ => unreachable!("not an assignment operator"),
    };
    Some(opcode)
}

fn plain_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::BitwiseOr => Opcode::BitwiseOr,
        BinaryOp::BitwiseXor => Opcode::BitwiseXor,
        BinaryOp::BitwiseAnd => Opcode::BitwiseAnd,
        BinaryOp::Equal => Opcode::Equal,
        BinaryOp::NotEqual => Opcode::NotEqual,
        BinaryOp::Less => Opcode::Less,
        BinaryOp::LessEqual => Opcode::NotGreater,
        BinaryOp::Greater => Opcode::Greater,
        BinaryOp::GreaterEqual => Opcode::NotLess,
        BinaryOp::ShiftLeft => Opcode::BitwiseShiftLeft,
        BinaryOp::ShiftRight => Opcode::BitwiseShiftRight,
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Subtract => Opcode::Subtract,
        BinaryOp::Multiply => Opcode::Multiply,
        BinaryOp::Divide => Opcode::Divide,
        BinaryOp::Modulo => Opcode::Modulo,
        _ => unreachable!("not a plain binary operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::Parser, scanner::Scanner};

    fn compile(source: &str) -> CompileResult<Executable> {
        let program = Parser::new(Scanner::new(source, "test.oy")).parse_program()?;
        BytecodeGenerator::generate(&program)
    }

    #[test]
    fn program_is_prototype_zero_and_variadic() {
        let executable = compile("return 1;").unwrap();
        let program = executable.prototype(0);
        assert!(program.is_variadic());
        assert_eq!(program.regular_parameters(), 0);
    }

    #[test]
    fn every_prototype_ends_in_return() {
        let executable = compile("auto f = () { 1; }; f();").unwrap();
        for id in 0..executable.prototype_count() {
            let bytecode = executable.prototype(id).bytecode();
            let last = bytecode.iter().last().expect("non-empty prototype").1;
            assert_eq!(last.opcode, Opcode::Return);
        }
    }

    #[test]
    fn jump_targets_stay_in_bounds() {
        let executable = compile(
            "auto total = 0;
             for (auto i = 0; i < 3; ++i) {
                 if (i == 1) continue;
                 total += i;
             }
             switch (total) { case 2: break; default: total = 0; }
             return total;",
        )
        .unwrap();
        for id in 0..executable.prototype_count() {
            let bytecode = executable.prototype(id).bytecode();
            for (_, instruction) in bytecode.iter() {
                if matches!(
                    instruction.opcode,
                    Opcode::Jump | Opcode::JumpIfTrue | Opcode::JumpIfFalse
                ) {
                    let target = usize::try_from(instruction.immediate.unwrap()).unwrap();
                    assert!(target <= bytecode.len(), "jump target escapes the buffer");
                    assert_eq!(target % 4, 0, "jump target must be instruction-aligned");
                }
            }
        }
    }

    #[test]
    fn lvalue_required() {
        let error = compile("1 = 2;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::LvalueRequired));
        let error = compile("(a ? b : c) = 2;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::LvalueRequired));
        let error = compile("auto a; a + 1 = 2;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::LvalueRequired));
    }

    #[test]
    fn variable_not_found() {
        let error = compile("return missing;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::VariableNotFound(name) if name == "missing"));
    }

    #[test]
    fn duplicate_local_in_same_scope() {
        let error = compile("auto x; auto x;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::LocalVariableExists(name) if name == "x"));
        // shadowing in a nested block is fine
        compile("auto x; { auto x; }").unwrap();
    }

    #[test]
    fn stack_too_deep_with_too_many_locals() {
        let mut source = String::new();
        for i in 0..=256 {
            source.push_str(&format!("auto v{i};\n"));
        }
        let error = compile(&source).unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::StackTooDeep));
        assert_eq!(error.location.line, 257);
    }

    #[test]
    fn capture_descriptors_chain_through_intermediate_functions() {
        let executable = compile(
            "auto x = 1;
             auto outer = () { return () { return x; }; };
             return outer()();",
        )
        .unwrap();
        // prototype 1 is `outer`, prototype 2 the innermost function
        let outer = executable.prototype(1);
        assert!(matches!(outer.captures(), [CaptureDescriptor::Original(_)]));
        let inner = executable.prototype(2);
        assert!(matches!(inner.captures(), [CaptureDescriptor::Inherited(0)]));
    }

    #[test]
    fn register_count_covers_parameters() {
        let executable = compile("auto f = (auto a, auto b) { return a; };").unwrap();
        assert!(executable.prototype(1).register_count() >= 2);
    }
}
