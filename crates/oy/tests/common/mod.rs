//! Shared harness for the integration tests: compile a source string and
//! run it with a captured trace writer.

use oy::{CollectStringPrint, Interpreter, MAX_STACK_DEPTH, ModuleLoader, Script, ScriptError, Value};

/// Compiles and runs `source` with the given register-file cap, returning
/// the module value (or error) and everything `trace` printed.
pub fn try_run_with_depth(source: &str, max_stack_depth: usize) -> (Result<Value, ScriptError>, String) {
    let mut writer = CollectStringPrint::new();
    let result = {
        let mut loader = ModuleLoader::new(&mut writer);
        let mut interpreter = Interpreter::new(max_stack_depth);
        match Script::compile(source, "test.oy") {
            Ok(script) => script
                .run(&mut interpreter, &mut loader, &[])
                .map_err(ScriptError::from),
            Err(error) => Err(ScriptError::from(error)),
        }
    };
    (result, writer.into_output())
}

pub fn try_run(source: &str) -> Result<Value, ScriptError> {
    try_run_with_depth(source, MAX_STACK_DEPTH).0
}

pub fn run(source: &str) -> Value {
    match try_run(source) {
        Ok(value) => value,
        Err(error) => panic!("script failed: {error}"),
    }
}

pub fn run_int(source: &str) -> i64 {
    match run(source) {
        Value::Int(value) => value,
        other => panic!("expected an int, got {other:?}"),
    }
}

pub fn run_output(source: &str) -> String {
    let (result, output) = try_run_with_depth(source, MAX_STACK_DEPTH);
    if let Err(error) = result {
        panic!("script failed: {error}");
    }
    output
}
