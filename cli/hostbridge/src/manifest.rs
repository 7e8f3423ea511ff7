//! `hostbridge.toml` manifest parsing and project configuration.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use hostbridge_core::BridgePolicy;
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "hostbridge.toml";

/// The top-level manifest structure for a hostbridge project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostbridgeManifest {
    pub project: ProjectConfig,
    #[serde(default)]
    pub input: InputConfig,
    /// Classification and generation policy.
    #[serde(default)]
    pub bridge: BridgePolicy,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Names the generated files.
    pub name: String,
    /// Prefix stripped from display names.
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Preprocessed header files, relative to the project directory.
    #[serde(default)]
    pub headers: Vec<String>,
    /// Export list; every parsed function is exported when absent.
    #[serde(default)]
    pub exports: Option<String>,
    /// Extra tokens removed before parsing (calling-convention macros).
    #[serde(default)]
    pub strip_tokens: Vec<String>,
    /// Headers the generated bridge includes.
    #[serde(default)]
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "out".to_string()
}

/// Reject output directories that are not strictly inside the project
/// directory: `clean` removes this directory recursively.
pub fn check_output_dir(dir: &str) -> Result<()> {
    let mut depth = 0usize;
    for component in Path::new(dir).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            _ => bail!("output dir '{dir}' must be a relative path without '..'"),
        }
    }
    if depth == 0 {
        bail!("output dir '{dir}' must name a subdirectory of the project");
    }
    Ok(())
}

impl HostbridgeManifest {
    /// Search upward from `start_dir` for a `hostbridge.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        Self::find_and_load_within(start_dir, None)
    }

    /// Like [`find_and_load`](Self::find_and_load), but never looks above
    /// `ceiling`.
    pub fn find_and_load_within(start_dir: &Path, ceiling: Option<&Path>) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest = Self::parse(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if ceiling == Some(dir.as_path()) || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse and validate a manifest.
    pub fn parse(s: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(s)?;
        manifest.bridge.validate()?;
        check_output_dir(&manifest.output.dir).context("invalid [output].dir")?;
        Ok(manifest)
    }

    /// Generate the default template for `hostbridge init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
namespace = ""

[input]
headers = ["include/{name}.i"]
exports = "exports.txt"
strip_tokens = []
includes = ["{name}.h"]

[bridge]
int64_as_handle = false
skip_function_prefixes = []
unsupported = "mark"
handle_aliases = []

[output]
dir = "out"
"#
        )
    }
}

/// Read an export list: one name per line, `#` starts a comment.
pub fn read_exports(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading export list {}", path.display()))?;
    Ok(parse_exports(&text))
}

pub fn parse_exports(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbridge_core::UnsupportedPolicy;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[project]
name = "openxr"
namespace = "xr"

[input]
headers = ["include/openxr.i"]
exports = "exports.txt"
strip_tokens = ["XRAPI_ATTR", "XRAPI_CALL"]
includes = ["openxr/openxr.h"]

[bridge]
int64_as_handle = true
skip_function_prefixes = ["xrInternal"]
force_string_threshold = 4
unsupported = "skip"
handle_aliases = ["XrAsyncRequestIdFB"]

[output]
dir = "generated"
"#;
        let manifest = HostbridgeManifest::parse(toml_str).unwrap();
        assert_eq!(manifest.project.name, "openxr");
        assert_eq!(manifest.project.namespace, "xr");
        assert_eq!(manifest.input.strip_tokens.len(), 2);
        assert_eq!(manifest.input.exports.as_deref(), Some("exports.txt"));
        assert!(manifest.bridge.int64_as_handle);
        assert_eq!(manifest.bridge.force_string_threshold, Some(4));
        assert_eq!(manifest.bridge.unsupported, UnsupportedPolicy::Skip);
        assert_eq!(manifest.output.dir, "generated");
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = HostbridgeManifest::parse("[project]\nname = \"minimal\"\n").unwrap();
        assert_eq!(manifest.project.name, "minimal");
        assert!(manifest.project.namespace.is_empty());
        assert!(manifest.input.headers.is_empty());
        assert_eq!(manifest.bridge, BridgePolicy::default());
        assert_eq!(manifest.output.dir, "out");
    }

    #[test]
    fn reject_invalid_toml() {
        assert!(HostbridgeManifest::parse("this is not valid toml [[[").is_err());
        assert!(HostbridgeManifest::parse("[project]\nname = \"x\"\n[bridge]\nunsupported = \"ignore\"\n").is_err());
    }

    #[test]
    fn template_is_valid_toml() {
        let manifest = HostbridgeManifest::parse(&HostbridgeManifest::template("demo")).unwrap();
        assert_eq!(manifest.project.name, "demo");
        assert_eq!(manifest.input.headers, vec!["include/demo.i".to_string()]);
    }

    #[test]
    fn output_dir_must_stay_inside_the_project() {
        for dir in ["out", "./gen", "build/bridge"] {
            assert!(check_output_dir(dir).is_ok(), "{dir}");
        }
        for dir in [".", "", "..", "./", "out/..", "../out", "/tmp/out"] {
            assert!(check_output_dir(dir).is_err(), "{dir}");
        }
        let err = HostbridgeManifest::parse("[project]\nname = \"demo\"\n\n[output]\ndir = \".\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("[output].dir"));
    }

    #[test]
    fn export_lists_skip_comments_and_blanks() {
        let names = parse_exports("# exported\nxrCreateInstance\n\n  xrDestroyInstance  # teardown\n#xrHidden\n");
        assert_eq!(names, vec!["xrCreateInstance", "xrDestroyInstance"]);
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "[project]\nname = \"parent\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found_dir) = HostbridgeManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.project.name, "parent");
        assert_eq!(found_dir, dir.path());
    }

    #[test]
    fn find_and_load_stops_at_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_NAME), "[project]\nname = \"parent\"\n").unwrap();
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).unwrap();

        assert!(HostbridgeManifest::find_and_load_within(&nested, Some(&nested))
            .unwrap()
            .is_none());
        assert!(HostbridgeManifest::find_and_load_within(&nested, Some(dir.path()))
            .unwrap()
            .is_some());
    }
}
