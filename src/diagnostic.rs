#![allow(dead_code)]

//! The structured finding handed out of the core. No textual formatting is
//! mandated here; `main` renders one line per record.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DiagnosticKind {
    EndOfFunction,
    Return,
    Break,
    Continue,
    Forbidden,
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiagnosticKind::EndOfFunction => "EndOfFunction",
            DiagnosticKind::Return => "Return",
            DiagnosticKind::Break => "Break",
            DiagnosticKind::Continue => "Continue",
            DiagnosticKind::Forbidden => "Forbidden",
            DiagnosticKind::Internal => "Internal",
        };
        write!(f, "{text}")
    }
}

/// Diagnostics have no defined order across sibling paths (see the
/// concurrency contract); the CLI sorts by `(file, function, kind, reason)`
/// before printing so output is reproducible regardless of exploration or
/// per-file scheduling order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Diagnostic {
    pub(crate) file: String,
    pub(crate) function: String,
    pub(crate) kind: DiagnosticKind,
    pub(crate) reason: String,
    pub(crate) state_snapshot: Vec<i64>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}: {} (state={:?})",
            self.file, self.function, self.kind, self.reason, self.state_snapshot
        )
    }
}
