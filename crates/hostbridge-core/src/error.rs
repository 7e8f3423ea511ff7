//! Core error types.

/// Errors raised while classifying or ordering an API surface.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Struct embedding graph has no valid emission order.
    #[error("struct dependency cycle among: {}", structs.join(", "))]
    DependencyCycle { structs: Vec<String> },

    /// Policy values that cannot be applied.
    #[error("invalid bridge policy: {detail}")]
    InvalidPolicy { detail: String },

    /// A numeric value cannot be represented exactly as a host number.
    #[error("precision loss for '{name}': {detail}")]
    PrecisionLoss { name: String, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
