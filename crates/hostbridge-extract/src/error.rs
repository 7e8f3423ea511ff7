//! Extractor error types.
//!
//! Malformed declarations never surface here; they become
//! [`Diagnostic`](crate::Diagnostic)s. Only input that cannot be read at all
//! is an error.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read header '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for extractor operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
