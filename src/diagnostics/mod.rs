use crate::origin::Tokid;
use crate::show::Show;
use crate::source_files::SourceFiles;
use append_only_vec::AppendOnlyVec;
use colored::Colorize;
use std::cell::Cell;
use std::fmt::Debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub origin: Option<Tokid>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(origin: Tokid, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            origin: Some(origin),
            message: message.into(),
        }
    }

    pub fn warning(origin: Tokid, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            origin: Some(origin),
            message: message.into(),
        }
    }
}

impl Show for Diagnostic {
    fn show(&self, w: &mut dyn std::fmt::Write, files: &SourceFiles) -> std::fmt::Result {
        if let Some(origin) = self.origin {
            write!(
                w,
                "{}:{}: ",
                files.get(origin.file).filename(),
                files.line_of(origin)
            )?;
        }

        let severity = match self.severity {
            Severity::Warning => "warning: ".yellow(),
            Severity::Error => "error: ".red(),
        };

        write!(w, "{}{}", severity, self.message)
    }
}

/// Accumulates diagnostics behind a shared reference; recoverable
/// problems are recorded and processing continues.
pub struct Diagnostics {
    collected: AppendOnlyVec<Diagnostic>,
    errors: Cell<usize>,
}

impl Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("count", &self.collected.len())
            .finish_non_exhaustive()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            collected: AppendOnlyVec::new(),
            errors: Cell::new(0),
        }
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.errors.set(self.errors.get() + 1);
        }
        self.collected.push(diagnostic);
    }

    pub fn error(&self, origin: Tokid, message: impl Into<String>) {
        self.push(Diagnostic::error(origin, message));
    }

    pub fn warning(&self, origin: Tokid, message: impl Into<String>) {
        self.push(Diagnostic::warning(origin, message));
    }

    pub fn error_count(&self) -> usize {
        self.errors.get()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn len(&self) -> usize {
        self.collected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collected.len() == 0
    }

    pub fn print_all(&self, files: &SourceFiles) {
        for diagnostic in self.collected.iter() {
            let mut message = String::new();
            diagnostic
                .show(&mut message, files)
                .expect("render diagnostic");
            eprintln!("{}", message);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}
