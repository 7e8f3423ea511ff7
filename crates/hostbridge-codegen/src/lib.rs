//! C++ bridge generation for hostbridge.
//!
//! Turns a [`ReachableApi`] into a self-contained C++ translation unit of
//! `extern "C"` entry points that speak only `double` and `const char*`,
//! the runtime registry they share, and a JSON summary of every symbol.
//!
//! ## Modules
//!
//! - [`bridge`]: Wrappers around exported native functions
//! - [`codec`]: Per-struct JSON codecs and struct entry points
//! - [`native`]: Shims for residual native types
//! - [`runtime`]: The shipped C++ handle registry
//! - [`summary`]: The export summary and its tables
//! - [`emit`]: Source assembly and output files
//! - [`naming`]: Generated symbol names

pub mod bridge;
pub mod codec;
pub mod emit;
pub mod error;
pub mod naming;
pub mod native;
pub mod runtime;
pub mod summary;

pub use emit::{BridgeOutput, CppWriter, OutputFile};
pub use error::{CodegenError, Result};
pub use summary::{EntryKind, EntryParam, EntryPoint, ExportSummary, GenerationStats};

use std::collections::BTreeSet;

use hostbridge_core::{BridgePolicy, ReachableApi, UnsupportedPolicy};
use tracing::{debug, info, warn};

/// Project-level naming and include settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Stem of the generated file names.
    pub project: String,
    /// Prefix stripped from display names (`xr` for `xrCreateInstance`).
    pub namespace: String,
    /// Headers the bridge includes, as `api.h` or `<api.h>`.
    pub includes: Vec<String>,
}

/// Facts about the parsed inputs recorded in the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub files: usize,
    pub declarations_parsed: usize,
    pub declarations_skipped: usize,
    /// See [`summary::input_digest`].
    pub digest: String,
}

fn validate_project(name: &str) -> Result<()> {
    let invalid = |detail: &str| CodegenError::InvalidProject {
        name: name.to_string(),
        detail: detail.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("only ASCII letters, digits, '_' and '-' are allowed"));
    }
    Ok(())
}

fn include_line(include: &str) -> String {
    let include = include.trim();
    if include.starts_with('<') || include.starts_with('"') {
        format!("#include {include}")
    } else {
        format!("#include {}", naming::cxx_string(include))
    }
}

pub fn header_name(project: &str) -> String {
    format!("{project}_bridge.h")
}

pub fn source_name(project: &str) -> String {
    format!("{project}_bridge.cpp")
}

pub fn summary_name(project: &str) -> String {
    format!("{project}_exports.json")
}

const BANNER: &str = "// Generated by hostbridge. Do not edit.";

/// Generate the bridge sources, runtime and export summary.
#[tracing::instrument(level = "debug", skip_all, fields(project = %config.project))]
pub fn generate(
    config: &BridgeConfig,
    api: &ReachableApi,
    policy: &BridgePolicy,
    source: &SourceInfo,
) -> Result<BridgeOutput> {
    validate_project(&config.project)?;
    policy.validate()?;
    let ns = config.namespace.as_str();

    let mut w = CppWriter::new();
    w.line(BANNER);
    w.line(include_line(&header_name(&config.project)));
    w.blank();
    for system in ["algorithm", "cstdint", "cstring", "string", "type_traits", "utility"] {
        w.line(format!("#include <{system}>"));
    }
    w.blank();
    w.line("#include <nlohmann/json.hpp>");
    w.blank();
    for include in &config.includes {
        w.line(include_line(include));
    }
    if !config.includes.is_empty() {
        w.blank();
    }

    let codecs: BTreeSet<&str> = api.structs.iter().map(|s| s.name.as_str()).collect();
    for s in &api.structs {
        codec::emit_codec(&mut w, s, &codecs);
    }

    let mut entry_points = runtime::entry_points();
    for s in &api.structs {
        entry_points.extend(codec::emit_struct_entry_points(&mut w, s, ns));
    }
    for native in &api.native_types {
        entry_points.extend(native::emit_native(&mut w, native, ns));
    }

    let mut stats = GenerationStats {
        files: source.files,
        declarations_parsed: source.declarations_parsed,
        declarations_skipped: source.declarations_skipped,
        structs: api.structs.len(),
        enums: api.enums.len(),
        native_types: api.native_types.len(),
        missing_exports: api.missing_exports.clone(),
        skipped_by_prefix: api.skipped_by_prefix.clone(),
        ..GenerationStats::default()
    };
    for f in &api.functions {
        let unresolved = f.unresolved_params();
        if !unresolved.is_empty() && policy.unsupported == UnsupportedPolicy::Skip {
            warn!(function = %f.name, types = ?unresolved, "skipping function with unsupported parameters");
            stats.functions_skipped.push(f.name.clone());
            continue;
        }
        let entry = bridge::emit_wrapper(&mut w, f, ns);
        if !entry.unsupported.is_empty() {
            stats.functions_marked += 1;
        }
        stats.functions_exported += 1;
        debug!(symbol = %entry.symbol, "wrapper emitted");
        entry_points.push(entry);
        if let Some(entry) = bridge::emit_buffer_wrapper(&mut w, f, ns) {
            debug!(symbol = %entry.symbol, "buffer wrapper emitted");
            stats.buffer_wrappers += 1;
            entry_points.push(entry);
        }
    }
    let bridge_source = w.finish();

    let mut h = CppWriter::new();
    h.line(BANNER);
    h.line("#pragma once");
    h.blank();
    h.line(include_line(runtime::HEADER_NAME));
    h.blank();
    for ep in entry_points.iter().filter(|ep| ep.kind != EntryKind::Runtime) {
        h.line(format!("HB_EXPORT {};", ep.prototype()));
    }
    let bridge_header = h.finish();

    let summary = ExportSummary {
        project: config.project.clone(),
        namespace: config.namespace.clone(),
        entry_points,
        enums: summary::enum_table(&api.enums, ns),
        constants: summary::constant_table(&api.constants),
        struct_order: api.struct_order().into_iter().map(str::to_string).collect(),
        stats,
        digest: source.digest.clone(),
    };

    let mut files = vec![
        OutputFile {
            name: header_name(&config.project),
            contents: bridge_header,
        },
        OutputFile {
            name: source_name(&config.project),
            contents: bridge_source,
        },
    ];
    files.extend(runtime::files());
    files.push(OutputFile {
        name: summary_name(&config.project),
        contents: summary.to_json()?,
    });

    info!(
        entry_points = summary.entry_points.len(),
        functions = summary.stats.functions_exported,
        structs = summary.stats.structs,
        "bridge generated"
    );
    Ok(BridgeOutput { files, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::{classify_api, compute_reachable};
    use hostbridge_extract::Extractor;

    const HEADER: &str = "\
#define XR_MAX_NAME 8
typedef enum XrMode { XR_MODE_IDLE = 0, XR_MODE_RUN = 1 } XrMode;
struct MyStruct { int a; char name[XR_MAX_NAME]; XrMode mode; };
uint64_t foo(int64_t bignum, MyStruct* s);
int consume(Mystery m);
XrMode get_label(int id, char out[XR_MAX_NAME]);
";

    fn config() -> BridgeConfig {
        BridgeConfig {
            project: "demo".into(),
            namespace: "xr".into(),
            includes: vec!["demo_api.h".into()],
        }
    }

    fn run(policy: &BridgePolicy, exports: &[&str]) -> BridgeOutput {
        let ex = Extractor::new().extract_str("demo_api.h", HEADER);
        let api = classify_api(ex.tables, policy);
        let exports: Vec<String> = exports.iter().map(|s| s.to_string()).collect();
        let reach = compute_reachable(&api, Some(&exports), policy).unwrap();
        let source = SourceInfo {
            files: 1,
            declarations_parsed: ex.report.parsed(),
            declarations_skipped: ex.report.skipped(),
            digest: summary::input_digest(&[HEADER]),
        };
        generate(&config(), &reach, policy, &source).unwrap()
    }

    #[test]
    fn oversized_and_pointer_wrapper_end_to_end() {
        let out = run(&BridgePolicy::default(), &["foo"]);
        let cpp = &out.file("demo_bridge.cpp").unwrap().contents;
        assert!(cpp.contains("#include \"demo_api.h\""));
        assert!(cpp.contains("hb::parse_i64(bignum, hb_bignum)"));
        let guard = cpp.find("if (!hb_s) return \"\";").unwrap();
        let call = cpp.find("foo(static_cast<int64_t>(hb_bignum)").unwrap();
        assert!(guard < call);
        assert!(cpp.contains("return hb::ret_text(std::to_string("));
        // codecs come before the entry points that use them
        let codec = cpp.find("static nlohmann::json hb_encode_MyStruct(").unwrap();
        let to_json = cpp.find("hb_MyStruct_to_json(").unwrap();
        assert!(codec < to_json);

        let header = &out.file("demo_bridge.h").unwrap().contents;
        assert!(header.contains("HB_EXPORT const char* hb_foo(const char* bignum, const char* s);"));
        assert!(header.contains("HB_EXPORT const char* hb_create_MyStruct();"));
        assert!(!header.contains("hb_init"));
    }

    #[test]
    fn summary_lists_entry_points_and_tables() {
        let out = run(&BridgePolicy::default(), &["foo", "consume", "absent"]);
        let s = &out.summary;
        assert_eq!(s.struct_order, vec!["MyStruct".to_string()]);
        assert_eq!(s.enums["Mode"]["RUN"], 1);
        assert_eq!(s.constants["XR_MAX_NAME"], serde_json::json!(8));
        assert_eq!(s.stats.functions_exported, 2);
        assert_eq!(s.stats.functions_marked, 1);
        assert_eq!(s.stats.missing_exports, vec!["absent".to_string()]);
        assert_eq!(s.digest.len(), 64);
        assert!(s.entry_points.iter().any(|e| e.symbol == "hb_release"));

        let json = &out.file("demo_exports.json").unwrap().contents;
        let parsed: ExportSummary = serde_json::from_str(json).unwrap();
        assert_eq!(&parsed, s);
    }

    #[test]
    fn skip_policy_drops_unsupported_functions() {
        let policy = BridgePolicy {
            unsupported: UnsupportedPolicy::Skip,
            ..BridgePolicy::default()
        };
        let out = run(&policy, &["foo", "consume"]);
        assert_eq!(out.summary.stats.functions_skipped, vec!["consume".to_string()]);
        assert!(!out.file("demo_bridge.cpp").unwrap().contents.contains("hb_consume"));
    }

    #[test]
    fn output_buffer_functions_get_both_wrappers() {
        let out = run(&BridgePolicy::default(), &["get_label"]);
        let symbols: Vec<&str> = out.summary.entry_points.iter().map(|e| e.symbol.as_str()).collect();
        assert!(symbols.contains(&"hb_get_label"));
        assert!(symbols.contains(&"hb_get_label_text"));
        assert_eq!(out.summary.stats.functions_exported, 1);
        assert_eq!(out.summary.stats.buffer_wrappers, 1);
        let header = &out.file("demo_bridge.h").unwrap().contents;
        assert!(header.contains("HB_EXPORT const char* hb_get_label_text(double id);"));
    }

    #[test]
    fn invalid_project_names_are_rejected() {
        let api = compute_reachable(
            &classify_api(Default::default(), &BridgePolicy::default()),
            None,
            &BridgePolicy::default(),
        )
        .unwrap();
        let config = BridgeConfig {
            project: "my bridge".into(),
            ..config()
        };
        let err = generate(&config, &api, &BridgePolicy::default(), &SourceInfo::default()).unwrap_err();
        assert!(matches!(err, CodegenError::InvalidProject { .. }));
    }

    #[test]
    fn outputs_are_written_to_disk() {
        let out = run(&BridgePolicy::default(), &["foo"]);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gen");
        let written = out.write_to(&target).unwrap();
        assert_eq!(written.len(), 5);
        assert!(target.join("hb_runtime.h").exists());
        let runtime = std::fs::read_to_string(target.join("hb_runtime.cpp")).unwrap();
        assert!(runtime.contains("Registry::store"));
    }
}
