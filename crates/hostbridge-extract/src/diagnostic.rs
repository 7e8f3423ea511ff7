//! Structured extraction diagnostics and per-run counts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a fragment was not turned into a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The fragment did not match its grammar and was skipped.
    MalformedDeclaration,
    /// An enumerator initializer could not be evaluated; auto-increment was used.
    UnevaluableInitializer,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MalformedDeclaration => write!(f, "malformed declaration"),
            DiagnosticKind::UnevaluableInitializer => write!(f, "unevaluable initializer"),
        }
    }
}

/// A located extraction problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub reason: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.column, self.kind, self.reason
        )
    }
}

/// Parsed-vs-skipped counts for one or more extraction passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractReport {
    pub files: usize,
    pub functions: usize,
    pub structs: usize,
    pub enums: usize,
    pub aliases: usize,
    pub function_pointers: usize,
    pub constants: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractReport {
    /// Total declarations recorded.
    pub fn parsed(&self) -> usize {
        self.functions
            + self.structs
            + self.enums
            + self.aliases
            + self.function_pointers
            + self.constants
    }

    /// Fragments skipped as malformed.
    pub fn skipped(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::MalformedDeclaration)
            .count()
    }

    pub fn merge(&mut self, other: ExtractReport) {
        self.files += other.files;
        self.functions += other.functions;
        self.structs += other.structs;
        self.enums += other.enums;
        self.aliases += other.aliases;
        self.function_pointers += other.function_pointers;
        self.constants += other.constants;
        self.diagnostics.extend(other.diagnostics);
    }
}
