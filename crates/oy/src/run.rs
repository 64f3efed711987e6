//! Compilation entry points, the host interface and script module
//! loading.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use ahash::AHashMap;

use crate::{
    bytecode::{BytecodeGenerator, Executable, Interpreter},
    error::{CompileError, CompileResult, RunResult, RuntimeError, RuntimeErrorKind},
    io::PrintWriter,
    location::SourceLocation,
    parser::Parser,
    scanner::Scanner,
    value::Value,
};

/// Services the interpreter obtains from its embedder: the `require`
/// builtin and the sink for `trace` output.
pub trait Host {
    /// Implements `require(path, ...)`. Receives the interpreter so a
    /// freshly compiled module can be executed on it, re-entering at
    /// `stack_base`.
    fn require(
        &mut self,
        interpreter: &mut Interpreter,
        location: &SourceLocation,
        stack_base: usize,
        arguments: &[Value],
    ) -> RunResult<Value>;

    fn writer(&mut self) -> &mut dyn PrintWriter;
}

/// Compiles source text: scanner, parser, bytecode generator. Returns the
/// program entry location (for stack traces) and the executable.
pub fn compile(source: &str, file_name: &str) -> CompileResult<(SourceLocation, Rc<Executable>)> {
    let scanner = Scanner::new(source, file_name);
    let entry = scanner.location();
    let program = Parser::new(scanner).parse_program()?;
    let executable = BytecodeGenerator::generate(&program)?;
    Ok((entry, Rc::new(executable)))
}

/// A compiled script, ready to run.
pub struct Script {
    entry: SourceLocation,
    executable: Rc<Executable>,
}

impl Script {
    pub fn compile(source: &str, file_name: &str) -> CompileResult<Self> {
        let (entry, executable) = compile(source, file_name)?;
        Ok(Self { entry, executable })
    }

    #[must_use]
    pub fn executable(&self) -> &Rc<Executable> {
        &self.executable
    }

    /// Runs the script's top-level prototype from stack base 0. The
    /// returned value is the module value; its `int`-ness decides the
    /// process exit status in the CLI.
    pub fn run(
        &self,
        interpreter: &mut Interpreter,
        host: &mut dyn Host,
        arguments: &[Value],
    ) -> RunResult<Value> {
        interpreter.run(host, &self.entry, &self.executable, 0, arguments)
    }
}

/// Any way a script run can fail, for hosts that drive whole files.
#[derive(Debug)]
pub enum ScriptError {
    Compilation(CompileError),
    Runtime(RuntimeError),
    Io(std::io::Error),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compilation(error) => write!(f, "{error}"),
            Self::Runtime(error) => write!(f, "{error}"),
            Self::Io(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<CompileError> for ScriptError {
    fn from(error: CompileError) -> Self {
        Self::Compilation(error)
    }
}

impl From<RuntimeError> for ScriptError {
    fn from(error: RuntimeError) -> Self {
        Self::Runtime(error)
    }
}

#[derive(Debug, Clone)]
enum ModuleState {
    /// Evaluation has started but not finished; hit again only on a
    /// dependency cycle.
    InProgress,
    Loaded(Value),
}

/// The default `Host`: owns the canonical-path → module-value cache and
/// loads `require`d scripts from the filesystem.
pub struct ModuleLoader<'w> {
    modules: AHashMap<PathBuf, ModuleState>,
    writer: &'w mut dyn PrintWriter,
}

impl<'w> ModuleLoader<'w> {
    pub fn new(writer: &'w mut dyn PrintWriter) -> Self {
        Self {
            modules: AHashMap::new(),
            writer,
        }
    }

    /// Compiles and runs a script file on the given interpreter; the
    /// top-level script participates in the module cache like any
    /// `require`d file.
    pub fn run_file(
        &mut self,
        interpreter: &mut Interpreter,
        path: &Path,
        arguments: &[Value],
    ) -> Result<Value, ScriptError> {
        let canonical = fs::canonicalize(path).map_err(ScriptError::Io)?;
        self.modules.insert(canonical.clone(), ModuleState::InProgress);

        let source = fs::read_to_string(&canonical).map_err(ScriptError::Io)?;
        let script = Script::compile(&source, &canonical.display().to_string())?;
        let value = script.run(interpreter, self, arguments)?;

        self.modules.insert(canonical, ModuleState::Loaded(value.clone()));
        Ok(value)
    }
}

impl Host for ModuleLoader<'_> {
    fn require(
        &mut self,
        interpreter: &mut Interpreter,
        location: &SourceLocation,
        stack_base: usize,
        arguments: &[Value],
    ) -> RunResult<Value> {
        let Some(first) = arguments.first() else {
            return Err(RuntimeError::new(RuntimeErrorKind::MissingArgument, location.clone()));
        };
        let Value::Str(path) = first else {
            return Err(RuntimeError::host(
                location.clone(),
                "require() failed: file path must be a string",
            ));
        };

        let canonical = fs::canonicalize(Path::new(&**path))
            .map_err(|error| RuntimeError::host(location.clone(), format!("require() failed: {error}")))?;

        match self.modules.get(&canonical) {
            Some(ModuleState::InProgress) => Err(RuntimeError::host(
                location.clone(),
                "require() failed: circular dependency",
            )),
            Some(ModuleState::Loaded(value)) => Ok(value.clone()),
            None => {
                self.modules.insert(canonical.clone(), ModuleState::InProgress);

                let source = fs::read_to_string(&canonical).map_err(|error| {
                    RuntimeError::host(location.clone(), format!("require() failed: {error}"))
                })?;
                let (_, executable) =
                    compile(&source, &canonical.display().to_string()).map_err(|error| {
                        RuntimeError::new(RuntimeErrorKind::Compilation(Box::new(error)), location.clone())
                    })?;

                // the module's top level runs on the current interpreter,
                // re-using the caller's argument base; the remaining
                // require() arguments become the module's argv
                let value = interpreter.run(self, location, &executable, stack_base, &arguments[1..])?;
                self.modules.insert(canonical, ModuleState::Loaded(value.clone()));
                Ok(value)
            }
        }
    }

    fn writer(&mut self) -> &mut dyn PrintWriter {
        self.writer
    }
}
