//! `hostbridge generate`: headers in, bridge sources out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hostbridge_codegen::{generate, BridgeConfig, BridgeOutput, SourceInfo};

use crate::commands::pipeline::analyze;
use crate::manifest::HostbridgeManifest;

/// Run the full pipeline and write every output file.
pub fn run(
    project_dir: &Path,
    manifest: &HostbridgeManifest,
    exports: Option<&str>,
    output: Option<&str>,
) -> Result<BridgeOutput> {
    let analysis = analyze(project_dir, manifest, exports)?;

    let config = BridgeConfig {
        project: manifest.project.name.clone(),
        namespace: manifest.project.namespace.clone(),
        includes: manifest.input.includes.clone(),
    };
    let source = SourceInfo {
        files: analysis.report.files,
        declarations_parsed: analysis.report.parsed(),
        declarations_skipped: analysis.report.skipped(),
        digest: analysis.digest,
    };
    let bridge = generate(&config, &analysis.reach, &manifest.bridge, &source).context("generating bridge")?;

    let out_dir = match output {
        Some(dir) => PathBuf::from(dir),
        None => project_dir.join(&manifest.output.dir),
    };
    let written = bridge.write_to(&out_dir)?;

    let stats = &bridge.summary.stats;
    println!(
        "Parsed {} declarations from {} file(s), skipped {}",
        stats.declarations_parsed, stats.files, stats.declarations_skipped
    );
    println!(
        "Exported {} function(s) ({} marked unsupported, {} skipped), {} struct(s), {} enum(s), {} native type(s)",
        stats.functions_exported,
        stats.functions_marked,
        stats.functions_skipped.len(),
        stats.structs,
        stats.enums,
        stats.native_types
    );
    for name in &stats.missing_exports {
        eprintln!("warning: export '{name}' has no parsed prototype");
    }
    println!("Wrote {} file(s) to {}", written.len(), out_dir.display());

    Ok(bridge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_codegen::EntryKind;
    use std::fs;

    fn project(dir: &Path, header: &str, exports: Option<&str>) -> HostbridgeManifest {
        fs::create_dir_all(dir.join("include")).unwrap();
        fs::write(dir.join("include/api.i"), header).unwrap();
        let mut toml = String::from("[project]\nname = \"api\"\nnamespace = \"xr\"\n\n[input]\nheaders = [\"include/api.i\"]\n");
        if let Some(list) = exports {
            fs::write(dir.join("exports.txt"), list).unwrap();
            toml.push_str("exports = \"exports.txt\"\n");
        }
        HostbridgeManifest::parse(&toml).unwrap()
    }

    #[test]
    fn generate_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = project(
            dir.path(),
            "typedef struct XrVector2f { float x; float y; } XrVector2f;\n\
             float xrLength(const XrVector2f* v);\n\
             void xrHidden(void);\n",
            Some("# public\nxrLength\nxrMissing\n"),
        );
        let out = run(dir.path(), &manifest, None, None).unwrap();

        let out_dir = dir.path().join("out");
        for name in ["api_bridge.h", "api_bridge.cpp", "hb_runtime.h", "hb_runtime.cpp", "api_exports.json"] {
            assert!(out_dir.join(name).is_file(), "missing {name}");
        }
        assert_eq!(out.summary.stats.functions_exported, 1);
        assert_eq!(out.summary.stats.missing_exports, vec!["xrMissing".to_string()]);
        let cpp = fs::read_to_string(out_dir.join("api_bridge.cpp")).unwrap();
        assert!(cpp.contains("hb_xrLength"));
        assert!(!cpp.contains("hb_xrHidden"));
    }

    #[test]
    fn output_override_and_export_override() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = project(dir.path(), "int one(void);\nint two(void);\n", None);
        let list = dir.path().join("only-two.txt");
        fs::write(&list, "two\n").unwrap();
        let target = dir.path().join("gen");

        let out = run(
            dir.path(),
            &manifest,
            Some(list.to_str().unwrap()),
            Some(target.to_str().unwrap()),
        )
        .unwrap();
        assert!(target.join("api_bridge.cpp").is_file());
        let wrapped: Vec<_> = out
            .summary
            .entry_points
            .iter()
            .filter(|e| e.kind == EntryKind::Function)
            .filter_map(|e| e.native.as_deref())
            .collect();
        assert_eq!(wrapped, vec!["two"]);
    }

    #[test]
    fn struct_cycles_abort_generation() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = project(
            dir.path(),
            "struct A { struct B b; };\nstruct B { struct A a; };\nvoid use_a(struct A a);\n",
            None,
        );
        let err = run(dir.path(), &manifest, None, None).unwrap_err();
        assert!(format!("{err:#}").contains("cycle"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn missing_header_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manifest =
            HostbridgeManifest::parse("[project]\nname = \"x\"\n[input]\nheaders = [\"nope.i\"]\n").unwrap();
        let err = run(dir.path(), &manifest, None, None).unwrap_err();
        assert!(format!("{err:#}").contains("nope.i"));
    }
}
