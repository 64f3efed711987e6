use std::{env, fs, path::Path, process::ExitCode};

use oy::{
    Interpreter, MAX_STACK_DEPTH, ModuleLoader, RuntimeError, RuntimeErrorKind, Script, ScriptError, StdPrint,
    Value,
};

fn main() -> ExitCode {
    let arguments: Vec<String> = env::args().collect();
    let program = arguments.first().map_or("oy", String::as_str);

    let mut rest = arguments.get(1..).unwrap_or_default();
    let mut dump = false;
    if rest.first().map(String::as_str) == Some("-d") {
        dump = true;
        rest = &rest[1..];
    }
    let Some(script_path) = rest.first() else {
        eprintln!("usage: {program} [-d] <script> [arg] ...");
        return ExitCode::FAILURE;
    };
    let script_arguments = &rest[1..];

    if dump {
        return dump_bytecode(script_path);
    }

    let mut writer = StdPrint;
    let mut loader = ModuleLoader::new(&mut writer);
    let mut interpreter = Interpreter::new(MAX_STACK_DEPTH);

    let values: Vec<Value> = script_arguments.iter().map(|argument| Value::string(argument.clone())).collect();

    match loader.run_file(&mut interpreter, Path::new(script_path), &values) {
        Ok(module_value) => exit_status(&module_value),
        Err(ScriptError::Io(error)) => {
            eprintln!("error: {script_path}: {error}");
            ExitCode::FAILURE
        }
        Err(ScriptError::Compilation(error)) => {
            eprintln!("compilation error: {error}");
            ExitCode::FAILURE
        }
        Err(ScriptError::Runtime(error)) => {
            report_runtime_error(&interpreter, &error);
            ExitCode::FAILURE
        }
    }
}

/// The script's top-level return value becomes the process exit status:
/// an integer's low byte, 0 for no value, 1 for anything else.
fn exit_status(module_value: &Value) -> ExitCode {
    match module_value {
        Value::Int(code) => ExitCode::from(*code as u8),
        Value::Void => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn report_runtime_error(interpreter: &Interpreter, error: &RuntimeError) {
    let mut message = String::from("stack trace:\n");
    // innermost frame last
    for location in interpreter.stack_trace().iter().rev() {
        message.push('\t');
        message.push_str(&location.to_string());
        message.push('\n');
    }
    match &error.kind {
        RuntimeErrorKind::Compilation(compile_error) => {
            message.push_str(&format!("compilation error: {compile_error}"));
        }
        _ => message.push_str(&format!("runtime error: {error}")),
    }
    eprintln!("{message}");
}

fn dump_bytecode(script_path: &str) -> ExitCode {
    let source = match fs::read_to_string(script_path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("error: {script_path}: {error}");
            return ExitCode::FAILURE;
        }
    };
    match Script::compile(&source, script_path) {
        Ok(script) => {
            print!("{}", script.executable().dump());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("compilation error: {error}");
            ExitCode::FAILURE
        }
    }
}
