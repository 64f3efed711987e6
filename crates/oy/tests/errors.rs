//! Compile-time and runtime error behavior.

mod common;

use common::{run_int, try_run, try_run_with_depth};
use oy::{CompileErrorKind, RuntimeErrorKind, ScriptError};

fn compile_error(source: &str) -> oy::CompileError {
    match try_run(source) {
        Err(ScriptError::Compilation(error)) => error,
        other => panic!("expected a compile error, got {other:?}"),
    }
}

fn runtime_error(source: &str) -> oy::RuntimeError {
    match try_run(source) {
        Err(ScriptError::Runtime(error)) => error,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn lvalue_required() {
    assert!(matches!(compile_error("1 = 2;").kind, CompileErrorKind::LvalueRequired));
    assert!(matches!(
        compile_error("auto a = 1; auto b = 2; (a ? a : b) = 3;").kind,
        CompileErrorKind::LvalueRequired
    ));
    assert!(matches!(
        compile_error("auto a = 1; a + 1 = 2;").kind,
        CompileErrorKind::LvalueRequired
    ));
    assert!(matches!(
        compile_error("auto a = 1; a++ = 2;").kind,
        CompileErrorKind::LvalueRequired
    ));
}

#[test]
fn variable_not_found() {
    let error = compile_error("return nope;");
    assert!(matches!(error.kind, CompileErrorKind::VariableNotFound(name) if name == "nope"));
}

#[test]
fn local_variable_exists() {
    let error = compile_error("auto x = 1; auto x = 2;");
    assert!(matches!(error.kind, CompileErrorKind::LocalVariableExists(name) if name == "x"));
}

#[test]
fn stack_too_deep_reports_the_offending_declaration() {
    let mut source = String::new();
    for i in 0..=256 {
        source.push_str(&format!("auto v{i};\n"));
    }
    let error = compile_error(&source);
    assert!(matches!(error.kind, CompileErrorKind::StackTooDeep));
    assert_eq!(error.location.line, 257);
    assert_eq!(error.location.to_string(), "test.oy:257:6");
}

#[test]
fn unexpected_token_messages_list_expectations() {
    let error = compile_error("auto;");
    let message = error.to_string();
    assert!(message.contains("unexpected token ';'"), "got: {message}");
    assert!(message.contains("expect <identifier>"), "got: {message}");
}

#[test]
fn unterminated_input_is_end_of_file() {
    assert!(matches!(compile_error("auto x = 1").kind, CompileErrorKind::EndOfFile));
    assert!(matches!(compile_error("{").kind, CompileErrorKind::EndOfFile));
}

#[test]
fn divide_by_zero() {
    let error = runtime_error("auto d = 0;\nreturn 1 / d;");
    assert!(matches!(error.kind, RuntimeErrorKind::DivideByZero));
    assert_eq!(error.location.line, 2);
    let error = runtime_error("auto d = 0.0; return 1.5 / d;");
    assert!(matches!(error.kind, RuntimeErrorKind::DivideByZero));
    let error = runtime_error("auto d = 0; return 1 % d;");
    assert!(matches!(error.kind, RuntimeErrorKind::DivideByZero));
}

#[test]
fn incompatible_operand_types() {
    let error = runtime_error("return 1 + \"a\";");
    let RuntimeErrorKind::IncompatibleOperandTypes(kinds) = &error.kind else {
        panic!("expected incompatible operands, got {error:?}");
    };
    assert_eq!(kinds.len(), 2);
    assert!(error.to_string().contains("incompatible operand type(s): int, str"));

    assert!(matches!(
        runtime_error("return -\"a\";").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
    assert!(matches!(
        runtime_error("return 1.5 & 2;").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
    assert!(matches!(
        runtime_error("foreach (auto k, v : 5) {}").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
}

#[test]
fn void_is_rejected_where_a_value_is_required() {
    assert!(matches!(
        runtime_error("auto x; return x + 1;").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
    assert!(matches!(
        runtime_error("auto x; auto y = x;").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
    assert!(matches!(
        runtime_error("auto x; if (x) {}").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
    // a void argument is rejected at the call site
    assert!(matches!(
        runtime_error("auto f = (auto a = 1) { return a; }; auto x; return f(x);").kind,
        RuntimeErrorKind::IncompatibleOperandTypes(_)
    ));
}

#[test]
fn index_out_of_range() {
    let error = runtime_error("auto a = [] {}; a[5] = 1;");
    assert!(matches!(error.kind, RuntimeErrorKind::IndexOutOfRange));
    let error = runtime_error("auto a = [] {1}; delete a[7];");
    assert!(matches!(error.kind, RuntimeErrorKind::IndexOutOfRange));
    // negative indexes read as misses instead
    assert_eq!(run_int("auto a = [] {1}; return typeof(a[-1]) == \"void\" ? 1 : 0;"), 1);
}

#[test]
fn argument_count_mismatches() {
    assert!(matches!(
        runtime_error("auto f = (auto a) { return a; }; return f();").kind,
        RuntimeErrorKind::MissingArgument
    ));
    assert!(matches!(
        runtime_error("auto f = (auto a) { return a; }; return f(1, 2);").kind,
        RuntimeErrorKind::TooManyArguments
    ));
    // a variadic callee takes any surplus
    assert_eq!(run_int("auto f = (auto a, auto ...r) { return sizeof(r); }; return f(1, 2, 3);"), 2);
}

#[test]
fn calling_a_non_callable_value() {
    let error = runtime_error("auto x = 3; return x();");
    assert!(matches!(error.kind, RuntimeErrorKind::IncompatibleOperandTypes(_)));
}

#[test]
fn runaway_recursion_overflows_the_register_file() {
    let (result, _) = try_run_with_depth("auto f; f = () { return f(); }; return f();", 512);
    match result {
        Err(ScriptError::Runtime(error)) => {
            assert!(matches!(error.kind, RuntimeErrorKind::StackOverflow));
        }
        other => panic!("expected a stack overflow, got {other:?}"),
    }
}

#[test]
fn trace_output_before_an_error_is_kept() {
    let (result, output) = try_run_with_depth("trace(\"before\");\nreturn 1 / 0;", 1024);
    assert!(matches!(result, Err(ScriptError::Runtime(_))));
    assert_eq!(output, "\"before\"\n");
}
