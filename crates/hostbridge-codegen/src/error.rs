//! Code generation error types.

use std::path::PathBuf;

use hostbridge_core::BridgeError;

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Project name unusable as a file stem.
    #[error("invalid project name '{name}': {detail}")]
    InvalidProject { name: String, detail: String },

    /// Writing an output file failed.
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for code generation.
pub type Result<T> = std::result::Result<T, CodegenError>;
