//! Structural extraction of C/C++ declarations from normalized header text.
//!
//! Input is preprocessor output (or a hand-written equivalent): directives on
//! their own lines and no conditional compilation. The extractor produces
//! [`DeclTables`](hostbridge_core::DeclTables) plus an [`ExtractReport`] of
//! parsed counts and per-fragment diagnostics.
//!
//! ```
//! use hostbridge_extract::Extractor;
//!
//! let ex = Extractor::new().extract_str("api.h", "int add(int a, int b);");
//! assert_eq!(ex.tables.functions[0].name, "add");
//! ```

pub mod constexpr;
pub mod diagnostic;
pub mod error;
pub mod lexer;
pub mod parser;

pub use diagnostic::{Diagnostic, DiagnosticKind, ExtractReport};
pub use error::{ExtractError, Result};
pub use parser::{Extraction, Extractor};
