//! Recursive-descent parser.
//!
//! Grammar levels, lowest binding first: comma, assignment (right
//! associative), ternary, the binary operator ladder (precedence
//! climbing), conversion/prefix operators, postfix/call/access chains,
//! primaries. `break`/`continue` are only accepted where the surrounding
//! construct allows them, so the generator never has to re-check.

use std::{collections::VecDeque, rc::Rc};

use crate::{
    ast::{
        ArrayElement, BinaryOp, BuiltinName, ConversionOp, Expr, FunctionLiteral, Ident, PostfixOp, PrefixOp, Stmt,
        StructureField, SwitchClause,
    },
    error::{CompileError, CompileErrorKind, CompileResult},
    location::SourceLocation,
    scanner::Scanner,
    token::{Token, TokenKind},
};

pub struct Parser {
    scanner: Scanner,
    buffer: VecDeque<Token>,
    program_location: SourceLocation,
    break_allowed: bool,
    continue_allowed: bool,
}

impl Parser {
    #[must_use]
    pub fn new(scanner: Scanner) -> Self {
        let program_location = scanner.location();
        Self {
            scanner,
            buffer: VecDeque::new(),
            program_location,
            break_allowed: false,
            continue_allowed: false,
        }
    }

    /// Parses a whole script: a sequence of statements wrapped into a
    /// variadic function literal whose rest parameter is `argv`.
    pub fn parse_program(&mut self) -> CompileResult<FunctionLiteral> {
        let location = self.program_location.clone();
        let rest_parameter = Ident {
            name: Rc::from("argv"),
            location: location.clone(),
        };

        let mut statements = Vec::new();
        while self.peek(0)?.is_some() {
            statements.push(self.statement(true)?);
        }

        Ok(FunctionLiteral {
            parameters: Vec::new(),
            default_parameters: Vec::new(),
            rest_parameter: Some(rest_parameter),
            body: statements,
            body_location: location,
        })
    }

    // ----------------------------------------------------------------
    // statements

    fn statement(&mut self, auto_allowed: bool) -> CompileResult<Stmt> {
        let Some(kind) = self.peek_kind(0)? else {
            let at = self.scanner.location();
            return Err(CompileError::new(CompileErrorKind::EndOfFile, at));
        };

        match kind {
            TokenKind::Semicolon => self.null_statement(),
            TokenKind::LBrace => self.block_statement(),
            TokenKind::KwReturn => self.return_statement(),
            TokenKind::KwDelete => self.delete_statement(),
            TokenKind::KwIf => self.if_statement(),
            TokenKind::KwSwitch => self.switch_statement(),
            TokenKind::KwWhile => self.while_statement(),
            TokenKind::KwDo => self.do_while_statement(),
            TokenKind::KwFor => self.for_statement(),
            TokenKind::KwForeach => self.foreach_statement(),
            TokenKind::KwAuto if auto_allowed => self.auto_statement(),
            TokenKind::KwBreak if self.break_allowed => self.break_statement(),
            TokenKind::KwContinue if self.continue_allowed => self.continue_statement(),
            _ => self.expression_statement(),
        }
    }

    fn null_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::Semicolon])?.location;
        Ok(Stmt::Null { location })
    }

    fn block_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::LBrace])?.location;
        let mut statements = Vec::new();
        while self.peek_kind(0)? != Some(TokenKind::RBrace) {
            statements.push(self.statement(true)?);
        }
        self.next()?;
        Ok(Stmt::Block { location, statements })
    }

    fn auto_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwAuto])?.location;
        let mut variables = Vec::new();

        loop {
            if !variables.is_empty() {
                let separator = self.expect(&[TokenKind::Semicolon, TokenKind::Comma])?;
                if separator.kind == TokenKind::Semicolon {
                    break;
                }
            }

            let name = self.user_defined_name()?;
            let value = if self.peek_kind(0)? == Some(TokenKind::Assign) {
                self.next()?;
                Some(self.expression2()?)
            } else {
                None
            };
            variables.push((name, value));
        }

        Ok(Stmt::Auto { location, variables })
    }

    fn return_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwReturn])?.location;
        let expression = if self.peek_kind(0)? == Some(TokenKind::Semicolon) {
            self.next()?;
            None
        } else {
            let expression = self.expression1()?;
            self.expect(&[TokenKind::Semicolon])?;
            Some(expression)
        };
        Ok(Stmt::Return { location, expression })
    }

    fn delete_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwDelete])?.location;
        let container = self.expression7()?;
        let key = self.designator()?;
        self.expect(&[TokenKind::Semicolon])?;
        Ok(Stmt::Delete { location, container, key })
    }

    fn break_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwBreak])?.location;
        self.expect(&[TokenKind::Semicolon])?;
        Ok(Stmt::Break { location })
    }

    fn continue_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwContinue])?.location;
        self.expect(&[TokenKind::Semicolon])?;
        Ok(Stmt::Continue { location })
    }

    fn paren_initializer(&mut self) -> CompileResult<Option<Box<Stmt>>> {
        if self.peek_kind(0)? == Some(TokenKind::KwAuto) {
            Ok(Some(Box::new(self.auto_statement()?)))
        } else {
            Ok(None)
        }
    }

    fn if_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwIf])?.location;
        self.expect(&[TokenKind::LParen])?;
        let initialization = self.paren_initializer()?;
        let condition = self.expression1()?;
        self.expect(&[TokenKind::RParen])?;
        let then_body = Box::new(self.statement(false)?);
        let else_body = if self.peek_kind(0)? == Some(TokenKind::KwElse) {
            self.next()?;
            Some(Box::new(self.statement(false)?))
        } else {
            None
        };
        Ok(Stmt::If {
            location,
            initialization,
            condition,
            then_body,
            else_body,
        })
    }

    fn switch_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwSwitch])?.location;
        self.expect(&[TokenKind::LParen])?;
        let initialization = self.paren_initializer()?;
        let discriminant = self.expression1()?;
        self.expect(&[TokenKind::RParen])?;

        self.expect(&[TokenKind::LBrace])?;
        let mut clauses = Vec::new();
        while self.peek_kind(0)? != Some(TokenKind::RBrace) {
            clauses.push(self.switch_clause()?);
        }
        self.next()?;

        Ok(Stmt::Switch {
            location,
            initialization,
            discriminant,
            clauses,
        })
    }

    fn switch_clause(&mut self) -> CompileResult<SwitchClause> {
        let token = self.expect(&[TokenKind::KwCase, TokenKind::KwDefault])?;
        let location = token.location;

        let label = if token.kind == TokenKind::KwCase {
            let label = self.expression1()?;
            self.expect(&[TokenKind::Colon])?;
            Some(label)
        } else {
            self.expect(&[TokenKind::Colon])?;
            None
        };

        let saved = self.break_allowed;
        self.break_allowed = true;
        let mut statements = Vec::new();
        let result = loop {
            let at_end = match self.peek_kind(0)? {
                Some(TokenKind::RBrace) => true,
                Some(TokenKind::KwCase | TokenKind::KwDefault) => label.is_some(),
                _ => false,
            };
            if at_end {
                break Ok(());
            }
            match self.statement(false) {
                Ok(statement) => statements.push(statement),
                Err(error) => break Err(error),
            }
        };
        self.break_allowed = saved;
        result?;

        Ok(SwitchClause {
            location,
            label,
            statements,
        })
    }

    fn loop_body(&mut self) -> CompileResult<Box<Stmt>> {
        let saved = (self.break_allowed, self.continue_allowed);
        self.break_allowed = true;
        self.continue_allowed = true;
        let body = self.statement(false);
        (self.break_allowed, self.continue_allowed) = saved;
        Ok(Box::new(body?))
    }

    fn while_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwWhile])?.location;
        self.expect(&[TokenKind::LParen])?;
        let initialization = self.paren_initializer()?;
        let condition = self.expression1()?;
        self.expect(&[TokenKind::RParen])?;
        let body = self.loop_body()?;
        Ok(Stmt::While {
            location,
            initialization,
            condition,
            body,
        })
    }

    fn do_while_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwDo])?.location;
        let body = self.loop_body()?;
        self.expect(&[TokenKind::KwWhile])?;
        self.expect(&[TokenKind::LParen])?;
        let initialization = self.paren_initializer()?;
        let condition = self.expression1()?;
        self.expect(&[TokenKind::RParen])?;
        self.expect(&[TokenKind::Semicolon])?;
        Ok(Stmt::DoWhile {
            location,
            body,
            initialization,
            condition,
        })
    }

    fn for_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwFor])?.location;
        self.expect(&[TokenKind::LParen])?;

        let initialization = match self.peek_kind(0)? {
            Some(TokenKind::Semicolon) => {
                self.next()?;
                None
            }
            Some(TokenKind::KwAuto) => Some(Box::new(self.auto_statement()?)),
            _ => Some(Box::new(self.expression_statement()?)),
        };

        let condition = if self.peek_kind(0)? == Some(TokenKind::Semicolon) {
            self.next()?;
            None
        } else {
            let condition = self.expression1()?;
            self.expect(&[TokenKind::Semicolon])?;
            Some(condition)
        };

        let iteration = if self.peek_kind(0)? == Some(TokenKind::RParen) {
            self.next()?;
            None
        } else {
            let iteration = self.expression1()?;
            self.expect(&[TokenKind::RParen])?;
            Some(iteration)
        };

        let body = self.loop_body()?;
        Ok(Stmt::For {
            location,
            initialization,
            condition,
            iteration,
            body,
        })
    }

    fn foreach_statement(&mut self) -> CompileResult<Stmt> {
        let location = self.expect(&[TokenKind::KwForeach])?.location;
        self.expect(&[TokenKind::LParen])?;
        self.expect(&[TokenKind::KwAuto])?;
        let key = self.user_defined_name()?;

        let separator = self.expect(&[TokenKind::Comma, TokenKind::Colon])?;
        let value = if separator.kind == TokenKind::Comma {
            let value = self.user_defined_name()?;
            self.expect(&[TokenKind::Colon])?;
            Some(value)
        } else {
            None
        };

        let container = self.expression1()?;
        self.expect(&[TokenKind::RParen])?;
        let body = self.loop_body()?;

        Ok(Stmt::Foreach {
            location,
            key,
            value,
            container,
            body,
        })
    }

    fn expression_statement(&mut self) -> CompileResult<Stmt> {
        let expression = self.expression1()?;
        let location = expression.location().clone();
        self.expect(&[TokenKind::Semicolon])?;
        Ok(Stmt::Expression { location, expression })
    }

    // ----------------------------------------------------------------
    // expressions

    fn expression1(&mut self) -> CompileResult<Expr> {
        let mut expression = self.expression2()?;
        while self.peek_kind(0)? == Some(TokenKind::Comma) {
            self.next()?;
            let right = self.expression2()?;
            let location = expression.location().clone();
            expression = Expr::Binary {
                location,
                op: BinaryOp::Comma,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Ok(expression)
    }

    fn expression2(&mut self) -> CompileResult<Expr> {
        let expression = self.expression3()?;
        let Some(kind) = self.peek_kind(0)? else {
            return Ok(expression);
        };
        let Some(op) = assignment_op(kind) else {
            return Ok(expression);
        };
        self.next()?;
        let value = self.expression2()?;
        let location = expression.location().clone();
        Ok(Expr::Binary {
            location,
            op,
            left: Box::new(expression),
            right: Box::new(value),
        })
    }

    fn expression3(&mut self) -> CompileResult<Expr> {
        let expression = self.expression4(1)?;
        if self.peek_kind(0)? != Some(TokenKind::Question) {
            return Ok(expression);
        }
        self.next()?;
        let then_value = self.expression3()?;
        self.expect(&[TokenKind::Colon])?;
        let else_value = self.expression3()?;
        let location = expression.location().clone();
        Ok(Expr::Ternary {
            location,
            condition: Box::new(expression),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        })
    }

    fn expression4(&mut self, min_precedence: u8) -> CompileResult<Expr> {
        let mut expression = self.expression5()?;
        loop {
            let Some(kind) = self.peek_kind(0)? else {
                break;
            };
            let Some((op, precedence)) = binary_op(kind) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.next()?;
            let right = self.expression4(precedence + 1)?;
            let location = expression.location().clone();
            expression = Expr::Binary {
                location,
                op,
                left: Box::new(expression),
                right: Box::new(right),
            };
        }
        Ok(expression)
    }

    fn expression5(&mut self) -> CompileResult<Expr> {
        let Some(kind) = self.peek_kind(0)? else {
            let at = self.scanner.location();
            return Err(CompileError::new(CompileErrorKind::EndOfFile, at));
        };

        if let Some(op) = conversion_op(kind) {
            let location = self.next()?.location;
            self.expect(&[TokenKind::LParen])?;
            let operand = self.expression2()?;
            self.expect(&[TokenKind::RParen])?;
            return Ok(Expr::Convert {
                location,
                op,
                operand: Box::new(operand),
            });
        }

        if let Some(op) = prefix_op(kind) {
            let location = self.next()?.location;
            let operand = self.expression5()?;
            return Ok(Expr::Prefix {
                location,
                op,
                operand: Box::new(operand),
            });
        }

        self.expression6()
    }

    fn expression6(&mut self) -> CompileResult<Expr> {
        let mut expression = self.expression7()?;
        loop {
            match self.peek_kind(0)? {
                Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                    let token = self.next()?;
                    let op = if token.kind == TokenKind::PlusPlus {
                        PostfixOp::Increment
                    } else {
                        PostfixOp::Decrement
                    };
                    let location = expression.location().clone();
                    expression = Expr::Postfix {
                        location,
                        op,
                        operand: Box::new(expression),
                    };
                }
                Some(kind @ (TokenKind::Dot | TokenKind::LBracket)) => {
                    let key = self.designator()?;
                    let location = expression.location().clone();
                    let op = if kind == TokenKind::Dot {
                        BinaryOp::Member
                    } else {
                        BinaryOp::Index
                    };
                    expression = Expr::Binary {
                        location,
                        op,
                        left: Box::new(expression),
                        right: Box::new(key),
                    };
                }
                Some(TokenKind::LParen) => {
                    self.next()?;
                    let location = expression.location().clone();
                    let mut operands = vec![expression];
                    let mut argument_count = 0usize;
                    loop {
                        if argument_count >= 1 {
                            let separator = self.expect(&[TokenKind::RParen, TokenKind::Comma])?;
                            if separator.kind == TokenKind::RParen {
                                break;
                            }
                        }
                        if self.peek_kind(0)? == Some(TokenKind::RParen) {
                            self.next()?;
                            break;
                        }
                        operands.push(self.expression2()?);
                        argument_count += 1;
                    }
                    expression = Expr::Call { location, operands };
                }
                _ => break,
            }
        }
        Ok(expression)
    }

    fn expression7(&mut self) -> CompileResult<Expr> {
        let Some(token) = self.peek(0)?.cloned() else {
            let at = self.scanner.location();
            return Err(CompileError::new(CompileErrorKind::EndOfFile, at));
        };

        let expression = match token.kind {
            TokenKind::LParen => {
                if matches!(
                    self.peek_kind(1)?,
                    Some(TokenKind::KwAuto | TokenKind::Ellipsis | TokenKind::RParen)
                ) {
                    let function = self.function_literal()?;
                    Expr::FunctionLiteral {
                        location: token.location,
                        function: Box::new(function),
                    }
                } else {
                    self.next()?;
                    let inner = self.expression1()?;
                    self.expect(&[TokenKind::RParen])?;
                    inner
                }
            }
            TokenKind::KwNull => {
                self.next()?;
                Expr::Null { location: token.location }
            }
            TokenKind::KwTrue | TokenKind::KwFalse => {
                self.next()?;
                Expr::Boolean {
                    location: token.location,
                    value: token.kind == TokenKind::KwTrue,
                }
            }
            TokenKind::IntegerLiteral => {
                self.next()?;
                Expr::Integer {
                    location: token.location,
                    value: parse_integer_literal(&token.text),
                }
            }
            TokenKind::FloatLiteral => {
                self.next()?;
                Expr::Float {
                    location: token.location,
                    value: token.text.parse().expect("scanner-validated float literal"),
                }
            }
            TokenKind::StringLiteral => {
                let mut value = self.next()?.text;
                // adjacent string literals concatenate
                while self.peek_kind(0)? == Some(TokenKind::StringLiteral) {
                    value.push_str(&self.next()?.text);
                }
                Expr::Str {
                    location: token.location,
                    value: Rc::from(value),
                }
            }
            TokenKind::Identifier => {
                self.next()?;
                Expr::Identifier(Ident {
                    name: Rc::from(token.text),
                    location: token.location,
                })
            }
            TokenKind::LBracket => self.array_literal()?,
            TokenKind::KwStruct => self.structure_literal()?,
            TokenKind::KwTrace => {
                self.next()?;
                Expr::Builtin {
                    location: token.location,
                    name: BuiltinName::Trace,
                }
            }
            TokenKind::KwRequire => {
                self.next()?;
                Expr::Builtin {
                    location: token.location,
                    name: BuiltinName::Require,
                }
            }
            _ => {
                return Err(CompileError::new(
                    CompileErrorKind::UnexpectedToken {
                        found: token.text,
                        expected: Vec::new(),
                    },
                    token.location,
                ));
            }
        };

        Ok(expression)
    }

    /// A member or index key: `.name` becomes a string literal, `[expr]`
    /// is an arbitrary key expression.
    fn designator(&mut self) -> CompileResult<Expr> {
        let token = self.expect(&[TokenKind::Dot, TokenKind::LBracket])?;
        if token.kind == TokenKind::Dot {
            let name = self.expect(&[TokenKind::Identifier])?;
            Ok(Expr::Str {
                location: name.location,
                value: Rc::from(name.text),
            })
        } else {
            let key = self.expression1()?;
            self.expect(&[TokenKind::RBracket])?;
            Ok(key)
        }
    }

    fn array_literal(&mut self) -> CompileResult<Expr> {
        let location = self.expect(&[TokenKind::LBracket])?.location;
        self.expect(&[TokenKind::RBracket])?;
        self.expect(&[TokenKind::LBrace])?;

        let mut elements: Vec<ArrayElement> = Vec::new();
        loop {
            if !elements.is_empty() {
                let separator = self.expect(&[TokenKind::RBrace, TokenKind::Comma])?;
                if separator.kind == TokenKind::RBrace {
                    break;
                }
            }
            if self.peek_kind(0)? == Some(TokenKind::RBrace) {
                self.next()?;
                break;
            }

            let index = if self.peek_kind(0)? == Some(TokenKind::LBracket) {
                let index = self.designator()?;
                self.expect(&[TokenKind::Assign])?;
                Some(index)
            } else {
                None
            };
            let value = self.expression2()?;
            elements.push(ArrayElement { index, value });
        }

        Ok(Expr::ArrayLiteral { location, elements })
    }

    fn structure_literal(&mut self) -> CompileResult<Expr> {
        let location = self.expect(&[TokenKind::KwStruct])?.location;
        self.expect(&[TokenKind::LBrace])?;

        let mut fields: Vec<StructureField> = Vec::new();
        loop {
            if !fields.is_empty() {
                let separator = self.expect(&[TokenKind::RBrace, TokenKind::Comma])?;
                if separator.kind == TokenKind::RBrace {
                    break;
                }
            }
            if self.peek_kind(0)? == Some(TokenKind::RBrace) {
                self.next()?;
                break;
            }

            let key = self.designator()?;
            self.expect(&[TokenKind::Assign])?;
            let value = self.expression2()?;
            fields.push(StructureField { key, value });
        }

        Ok(Expr::StructureLiteral { location, fields })
    }

    fn function_literal(&mut self) -> CompileResult<FunctionLiteral> {
        self.expect(&[TokenKind::LParen])?;

        let mut parameters: Vec<Ident> = Vec::new();
        let mut default_parameters: Vec<(Ident, Expr)> = Vec::new();
        let mut rest_parameter = None;

        loop {
            if !parameters.is_empty() || !default_parameters.is_empty() {
                let separator = self.expect(&[TokenKind::RParen, TokenKind::Comma])?;
                if separator.kind == TokenKind::RParen {
                    break;
                }
            }
            if self.peek_kind(0)? == Some(TokenKind::RParen) {
                self.next()?;
                break;
            }

            self.expect(&[TokenKind::KwAuto])?;
            if self.peek_kind(0)? == Some(TokenKind::Ellipsis) {
                self.next()?;
                rest_parameter = Some(self.user_defined_name()?);
                self.expect(&[TokenKind::RParen])?;
                break;
            }

            let parameter = self.user_defined_name()?;
            if default_parameters.is_empty() {
                if self.peek_kind(0)? == Some(TokenKind::Assign) {
                    self.next()?;
                    let default = self.expression2()?;
                    default_parameters.push((parameter, default));
                } else {
                    parameters.push(parameter);
                }
            } else {
                // once a default appears, every later parameter needs one
                self.expect(&[TokenKind::Assign])?;
                let default = self.expression2()?;
                default_parameters.push((parameter, default));
            }
        }

        let saved = (self.break_allowed, self.continue_allowed);
        self.break_allowed = false;
        self.continue_allowed = false;
        let body = self.block_statement();
        (self.break_allowed, self.continue_allowed) = saved;

        let Stmt::Block { location, statements } = body? else {
            unreachable!("block_statement returns a block")
        };

        Ok(FunctionLiteral {
            parameters,
            default_parameters,
            rest_parameter,
            body: statements,
            body_location: location,
        })
    }

    fn user_defined_name(&mut self) -> CompileResult<Ident> {
        let token = self.expect(&[TokenKind::Identifier])?;
        Ok(Ident {
            name: Rc::from(token.text),
            location: token.location,
        })
    }

    // ----------------------------------------------------------------
    // token pump

    fn next(&mut self) -> CompileResult<Token> {
        if let Some(token) = self.buffer.pop_front() {
            return Ok(token);
        }
        match self.scanner.next_token()? {
            Some(token) => Ok(token),
            None => {
                let at = self.scanner.location();
                Err(CompileError::new(CompileErrorKind::EndOfFile, at))
            }
        }
    }

    fn peek(&mut self, ahead: usize) -> CompileResult<Option<&Token>> {
        while self.buffer.len() <= ahead {
            match self.scanner.next_token()? {
                Some(token) => self.buffer.push_back(token),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.get(ahead))
    }

    fn peek_kind(&mut self, ahead: usize) -> CompileResult<Option<TokenKind>> {
        Ok(self.peek(ahead)?.map(|token| token.kind))
    }

    fn expect(&mut self, expected: &[TokenKind]) -> CompileResult<Token> {
        let token = self.next()?;
        if expected.contains(&token.kind) {
            Ok(token)
        } else {
            Err(CompileError::new(
                CompileErrorKind::UnexpectedToken {
                    found: token.text,
                    expected: expected.to_vec(),
                },
                token.location,
            ))
        }
    }
}

/// Parses a decimal or `0x` hexadecimal integer literal. Values beyond the
/// unsigned 64-bit range saturate, then reinterpret as a signed 64-bit
/// integer (two's-complement, as everywhere else in the language).
fn parse_integer_literal(text: &str) -> i64 {
    let magnitude = if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(digits, 16).unwrap_or(u64::MAX)
    } else {
        text.parse::<u64>().unwrap_or(u64::MAX)
    };
    magnitude.cast_signed()
}

fn assignment_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Assign => BinaryOp::Assign,
        TokenKind::PlusAssign => BinaryOp::AddAssign,
        TokenKind::MinusAssign => BinaryOp::SubtractAssign,
        TokenKind::StarAssign => BinaryOp::MultiplyAssign,
        TokenKind::SlashAssign => BinaryOp::DivideAssign,
        TokenKind::PercentAssign => BinaryOp::ModuloAssign,
        TokenKind::ShlAssign => BinaryOp::ShiftLeftAssign,
        TokenKind::ShrAssign => BinaryOp::ShiftRightAssign,
        TokenKind::AmpAssign => BinaryOp::AndAssign,
        TokenKind::CaretAssign => BinaryOp::XorAssign,
        TokenKind::PipeAssign => BinaryOp::OrAssign,
        _ => return None,
    };
    Some(op)
}

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::PipePipe => (BinaryOp::LogicalOr, 1),
        TokenKind::AmpAmp => (BinaryOp::LogicalAnd, 2),
        TokenKind::Pipe => (BinaryOp::BitwiseOr, 3),
        TokenKind::Caret => (BinaryOp::BitwiseXor, 4),
        TokenKind::Amp => (BinaryOp::BitwiseAnd, 5),
        TokenKind::Eq => (BinaryOp::Equal, 6),
        TokenKind::Ne => (BinaryOp::NotEqual, 6),
        TokenKind::Lt => (BinaryOp::Less, 7),
        TokenKind::Le => (BinaryOp::LessEqual, 7),
        TokenKind::Gt => (BinaryOp::Greater, 7),
        TokenKind::Ge => (BinaryOp::GreaterEqual, 7),
        TokenKind::Shl => (BinaryOp::ShiftLeft, 8),
        TokenKind::Shr => (BinaryOp::ShiftRight, 8),
        TokenKind::Plus => (BinaryOp::Add, 9),
        TokenKind::Minus => (BinaryOp::Subtract, 9),
        TokenKind::Star => (BinaryOp::Multiply, 10),
        TokenKind::Slash => (BinaryOp::Divide, 10),
        TokenKind::Percent => (BinaryOp::Modulo, 10),
        _ => return None,
    };
    Some(entry)
}

fn conversion_op(kind: TokenKind) -> Option<ConversionOp> {
    let op = match kind {
        TokenKind::KwBool => ConversionOp::Bool,
        TokenKind::KwInt => ConversionOp::Int,
        TokenKind::KwFloat => ConversionOp::Float,
        TokenKind::KwStr => ConversionOp::Str,
        TokenKind::KwSizeof => ConversionOp::Sizeof,
        TokenKind::KwTypeof => ConversionOp::Typeof,
        _ => return None,
    };
    Some(op)
}

fn prefix_op(kind: TokenKind) -> Option<PrefixOp> {
    let op = match kind {
        TokenKind::PlusPlus => PrefixOp::Increment,
        TokenKind::MinusMinus => PrefixOp::Decrement,
        TokenKind::Plus => PrefixOp::Plus,
        TokenKind::Minus => PrefixOp::Minus,
        TokenKind::Not => PrefixOp::LogicalNot,
        TokenKind::Tilde => PrefixOp::BitwiseNot,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> CompileResult<FunctionLiteral> {
        Parser::new(Scanner::new(source, "test.oy")).parse_program()
    }

    #[test]
    fn precedence_shapes() {
        let program = parse("auto x = 1 + 2 * 3;").unwrap();
        let Stmt::Auto { variables, .. } = &program.body[0] else {
            panic!("expected auto");
        };
        let Some(Expr::Binary { op, right, .. }) = &variables[0].1 else {
            panic!("expected binary initializer");
        };
        assert_eq!(*op, BinaryOp::Add);
        let Expr::Binary { op: inner, .. } = right.as_ref() else {
            panic!("expected nested multiply");
        };
        assert_eq!(*inner, BinaryOp::Multiply);
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse("a = b = 1;").unwrap();
        let Stmt::Expression { expression, .. } = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary { op, right, .. } = expression else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinaryOp::Assign);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                op: BinaryOp::Assign,
                ..
            }
        ));
    }

    #[test]
    fn member_access_desugars_to_string_key() {
        let program = parse("a.b;").unwrap();
        let Stmt::Expression { expression, .. } = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary { op, right, .. } = expression else {
            panic!("expected access");
        };
        assert_eq!(*op, BinaryOp::Member);
        assert!(matches!(right.as_ref(), Expr::Str { value, .. } if &**value == "b"));
    }

    #[test]
    fn function_literal_parameters() {
        let program = parse("auto f = (auto a, auto b = 2, auto ...rest) { return a; };").unwrap();
        let Stmt::Auto { variables, .. } = &program.body[0] else {
            panic!("expected auto");
        };
        let Some(Expr::FunctionLiteral { function, .. }) = &variables[0].1 else {
            panic!("expected function literal");
        };
        assert_eq!(function.parameters.len(), 1);
        assert_eq!(function.default_parameters.len(), 1);
        assert_eq!(function.rest_parameter.as_ref().map(|p| &*p.name), Some("rest"));
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let program = parse("auto s = \"a\" \"b\";").unwrap();
        let Stmt::Auto { variables, .. } = &program.body[0] else {
            panic!("expected auto");
        };
        assert!(matches!(
            &variables[0].1,
            Some(Expr::Str { value, .. }) if &**value == "ab"
        ));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let error = parse("break;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn break_inside_loop_parses() {
        parse("while (true) { break; }").unwrap();
        parse("switch (1) { case 1: break; }").unwrap();
    }

    #[test]
    fn continue_not_allowed_in_switch_clause() {
        assert!(parse("switch (1) { case 1: continue; }").is_err());
        parse("while (true) { switch (1) { case 1: continue; } }").unwrap();
    }

    #[test]
    fn integer_literals() {
        assert_eq!(parse_integer_literal("42"), 42);
        assert_eq!(parse_integer_literal("0x2A"), 42);
        assert_eq!(parse_integer_literal("9223372036854775808"), i64::MIN);
        assert_eq!(parse_integer_literal("18446744073709551615"), -1);
    }

    #[test]
    fn trailing_garbage_is_unexpected_token() {
        let error = parse("auto x = 1 1;").unwrap_err();
        assert!(matches!(error.kind, CompileErrorKind::UnexpectedToken { .. }));
    }
}
