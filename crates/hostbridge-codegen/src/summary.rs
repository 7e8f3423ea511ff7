//! Machine-readable export summary for host-side tooling.

use std::collections::BTreeMap;

use hostbridge_core::{BridgeError, Constant, EnumDef, HostType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Largest magnitude a double represents exactly as an integer.
pub const MAX_SAFE_INTEGER: i64 = 1 << 53;

/// What a generated entry point does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Wrapper around an exported native function.
    Function,
    /// Heap constructor for a struct or native type.
    Create,
    ToJson,
    FromJson,
    /// Native scalar accessor.
    Get,
    Set,
    /// Registry lifecycle provided by the runtime.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryParam {
    pub name: String,
    pub host_type: HostType,
}

/// One `extern "C"` symbol the host can bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub symbol: String,
    /// Name with the project namespace stripped.
    pub display_name: String,
    pub kind: EntryKind,
    /// The native function or type this entry point covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<String>,
    pub params: Vec<EntryParam>,
    pub returns: HostType,
    /// Declared types the generator could not resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported: Vec<String>,
}

impl EntryPoint {
    /// C prototype of the symbol, without the export macro.
    pub fn prototype(&self) -> String {
        let params = if self.params.is_empty() {
            String::new()
        } else {
            self.params
                .iter()
                .map(|p| format!("{} {}", host_cxx_type(p.host_type), p.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} {}({params})", host_cxx_type(self.returns), self.symbol)
    }
}

/// C++ spelling of a host value type at the bridge boundary.
pub fn host_cxx_type(host: HostType) -> &'static str {
    match host {
        HostType::Number => "double",
        HostType::String => "const char*",
    }
}

/// Parsed-vs-skipped counts for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub files: usize,
    pub declarations_parsed: usize,
    pub declarations_skipped: usize,
    pub functions_exported: usize,
    /// Wrappers emitted with unresolved parameter types.
    pub functions_marked: usize,
    /// Functions dropped by the `skip` unsupported policy.
    pub functions_skipped: Vec<String>,
    /// Extra wrappers that fill a trailing `char` buffer and return its text.
    #[serde(default)]
    pub buffer_wrappers: usize,
    pub structs: usize,
    pub enums: usize,
    pub native_types: usize,
    pub missing_exports: Vec<String>,
    pub skipped_by_prefix: Vec<String>,
}

/// Contents of `<project>_exports.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub project: String,
    pub namespace: String,
    pub entry_points: Vec<EntryPoint>,
    /// Enum display name → member display name → value.
    pub enums: BTreeMap<String, BTreeMap<String, i64>>,
    pub constants: BTreeMap<String, serde_json::Value>,
    pub struct_order: Vec<String>,
    pub stats: GenerationStats,
    /// SHA-256 over the input header texts, lowercase hex.
    pub digest: String,
}

impl ExportSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Digest of the input header texts, in order.
pub fn input_digest<S: AsRef<str>>(texts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        let text = text.as_ref();
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn enum_table(enums: &[EnumDef], namespace: &str) -> BTreeMap<String, BTreeMap<String, i64>> {
    enums
        .iter()
        .map(|e| {
            let members = e
                .members
                .iter()
                .map(|m| (e.display_member(&m.name), m.value))
                .collect();
            (e.display_name(namespace), members)
        })
        .collect()
}

/// Constants as JSON values; integers a double cannot hold exactly become text.
pub fn constant_table(constants: &BTreeMap<String, Constant>) -> BTreeMap<String, serde_json::Value> {
    constants
        .iter()
        .map(|(name, value)| {
            let json = match value {
                Constant::Int(v) if v.unsigned_abs() > MAX_SAFE_INTEGER.unsigned_abs() => {
                    let err = BridgeError::PrecisionLoss {
                        name: name.clone(),
                        detail: format!("{v} exceeds 2^53; emitted as text"),
                    };
                    warn!("{err}");
                    serde_json::Value::String(v.to_string())
                }
                Constant::Int(v) => serde_json::Value::from(*v),
                Constant::UInt(v) => {
                    let err = BridgeError::PrecisionLoss {
                        name: name.clone(),
                        detail: format!("{v} exceeds 2^53; emitted as text"),
                    };
                    warn!("{err}");
                    serde_json::Value::String(v.to_string())
                }
                Constant::Float(v) => serde_json::Number::from_f64(*v)
                    .map(serde_json::Value::Number)
                    .unwrap_or_else(|| serde_json::Value::String(v.to_string())),
                Constant::Str(s) => serde_json::Value::String(s.clone()),
            };
            (name.clone(), json)
        })
        .collect()
}
