//! Output sinks for the `trace` builtin.

use std::io::Write as _;

/// Receives the text produced by `trace(...)`.
///
/// Implement this to capture or redirect script output; the interpreter
/// writes one `line` call per `trace` invocation, without a trailing
/// newline.
pub trait PrintWriter {
    fn line(&mut self, text: &str);
}

/// Writes to the process stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn line(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{text}");
    }
}

/// Collects output into a string; useful in tests.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn line(&mut self, text: &str) {
        self.0.push_str(text);
        self.0.push('\n');
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn line(&mut self, _text: &str) {}
}
