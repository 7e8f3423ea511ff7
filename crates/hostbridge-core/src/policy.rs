//! Classification and generation policy.
//!
//! Read from the `[bridge]` table of the project manifest. Every field has a
//! default so an empty table is a valid policy.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// What to do with a function whose parameters cannot be classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedPolicy {
    /// Emit the wrapper with an `HB_UNSUPPORTED` marker.
    #[default]
    Mark,
    /// Drop the function from the bridge.
    Skip,
}

/// Project-level bridge policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePolicy {
    /// Pass 64-bit integers as registry handles instead of decimal text.
    #[serde(default)]
    pub int64_as_handle: bool,
    /// Functions whose names start with any of these are never exported.
    #[serde(default)]
    pub skip_function_prefixes: Vec<String>,
    /// Argument count above which numeric arguments of mixed signatures
    /// are passed as text. Absent means off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_string_threshold: Option<usize>,
    #[serde(default)]
    pub unsupported: UnsupportedPolicy,
    /// Alias names always treated as opaque handles.
    #[serde(default)]
    pub handle_aliases: Vec<String>,
}

impl BridgePolicy {
    /// Reject values that would make classification meaningless.
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = self.skip_function_prefixes.iter().find(|p| p.trim().is_empty()) {
            return Err(BridgeError::InvalidPolicy {
                detail: format!("empty skip_function_prefixes entry {prefix:?} would skip every function"),
            });
        }
        if self.force_string_threshold == Some(0) {
            return Err(BridgeError::InvalidPolicy {
                detail: "force_string_threshold must be at least 1".to_string(),
            });
        }
        if let Some(alias) = self.handle_aliases.iter().find(|a| a.trim().is_empty()) {
            return Err(BridgeError::InvalidPolicy {
                detail: format!("empty handle_aliases entry {alias:?}"),
            });
        }
        Ok(())
    }

    /// Whether a function is excluded by `skip_function_prefixes`.
    pub fn is_skipped(&self, function: &str) -> bool {
        self.skip_function_prefixes
            .iter()
            .any(|p| function.starts_with(p.as_str()))
    }

    pub fn is_handle_alias(&self, name: &str) -> bool {
        self.handle_aliases.iter().any(|a| a == name)
    }
}
