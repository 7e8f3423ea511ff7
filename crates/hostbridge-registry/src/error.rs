//! Registry error types.

/// Errors raised by handle lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Well-formed handle with no live entry (released, flushed, or never issued).
    #[error("no live object for handle '{handle}'")]
    HandleMiss { handle: String },

    /// Text that is not exactly `ref <tag> <id>`.
    #[error("malformed handle token '{token}': {detail}")]
    MalformedToken { token: String, detail: String },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
