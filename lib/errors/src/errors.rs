use std::{fmt::Display, ops::Deref};

pub use cursor::Line;
use itertools::Itertools;

/// Which stage a diagnostic came from. Lexical and syntax errors are both
/// compile errors; they suppress execution of the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Compile,
    Runtime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: Line,
    /// Rendered location (`'lexeme'` or `end`), empty if there is none.
    pub at: String,
    pub message: String,
}

impl Diagnostic {
    pub fn compile(line: Line, at: impl ToString, message: impl ToString) -> Self {
        Self {
            kind: DiagnosticKind::Compile,
            line,
            at: at.to_string(),
            message: message.to_string(),
        }
    }

    pub fn runtime(line: Line, message: impl ToString) -> Self {
        Self {
            kind: DiagnosticKind::Runtime,
            line,
            at: String::new(),
            message: message.to_string(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DiagnosticKind::Compile if self.at.is_empty() => {
                write!(f, "[line {}] Error: {}", self.line, self.message)
            }
            DiagnosticKind::Compile => {
                write!(f, "[line {}] Error at {}: {}", self.line, self.at, self.message)
            }
            DiagnosticKind::Runtime => {
                write!(f, "[line {}] RuntimeError: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Collects every diagnostic reported during one run of the pipeline.
///
/// The caller owns it and threads it through scanning, parsing and
/// interpretation, so separate runs (or separate interpreters) never share
/// error state.
#[derive(Debug, Default, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        log::debug!("Reporting diagnostic: {diagnostic}");
        self.0.push(diagnostic);
    }

    pub fn had_compile_error(&self) -> bool {
        self.0.iter().any(|d| d.kind == DiagnosticKind::Compile)
    }

    pub fn had_runtime_error(&self) -> bool {
        self.0.iter().any(|d| d.kind == DiagnosticKind::Runtime)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join("\n"))
    }
}
