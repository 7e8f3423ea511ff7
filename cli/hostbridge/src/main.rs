//! hostbridge CLI: generate host-callable C++ bridges from C/C++ headers.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use manifest::{HostbridgeManifest, MANIFEST_NAME};

#[derive(Parser)]
#[command(name = "hostbridge", version, about = "Header-to-host bridge generator")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); HOSTBRIDGE_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new hostbridge project
    Init {
        /// Project name
        name: String,
    },
    /// Extract, classify and write the bridge sources
    Generate {
        /// Export list overriding [input].exports
        #[arg(long)]
        exports: Option<String>,
        /// Output directory overriding [output].dir
        #[arg(long)]
        output: Option<String>,
    },
    /// Show extracted declarations, the reachable API or struct order
    Inspect {
        /// View mode (declarations, reachable, order)
        #[arg(long)]
        view: Option<String>,
        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,
        /// Export list overriding [input].exports
        #[arg(long)]
        exports: Option<String>,
    },
    /// Remove generated outputs
    Clean,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("HOSTBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Generate { exports, output } => {
            let (manifest, project_dir) = load_manifest_required(&cwd)?;
            commands::generate::run(&project_dir, &manifest, exports.as_deref(), output.as_deref())
                .map(|_| ())
        }

        Commands::Inspect {
            view,
            format,
            exports,
        } => {
            let (manifest, project_dir) = load_manifest_required(&cwd)?;
            commands::inspect::run(
                &project_dir,
                &manifest,
                view.as_deref(),
                format.as_deref(),
                exports.as_deref(),
            )
        }

        Commands::Clean => {
            let (manifest, project_dir) = load_manifest_required(&cwd)?;
            commands::clean::run(&project_dir, &manifest.output.dir)
        }
    }
}

/// Load manifest, returning error if not found.
fn load_manifest_required(cwd: &Path) -> anyhow::Result<(HostbridgeManifest, PathBuf)> {
    require_manifest(HostbridgeManifest::find_and_load(cwd)?)
}

fn require_manifest(found: Option<(HostbridgeManifest, PathBuf)>) -> anyhow::Result<(HostbridgeManifest, PathBuf)> {
    match found {
        Some((manifest, dir)) => Ok((manifest, dir)),
        None => anyhow::bail!("no {MANIFEST_NAME} found (run `hostbridge init` first)"),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::fs;

    const HEADER: &str = r#"
#define XR_MAX_NAME 16
#define XR_NULL_HANDLE 0
typedef struct XrInstance_T* XrInstance;
typedef enum XrResult { XR_SUCCESS = 0, XR_ERROR_HANDLE_INVALID = -12 } XrResult;
typedef struct XrApplicationInfo {
    char applicationName[XR_MAX_NAME];
    uint32_t applicationVersion;
    uint64_t engineVersion;
} XrApplicationInfo;
XRAPI_ATTR XrResult XRAPI_CALL xrCreateInstance(const XrApplicationInfo* info, XrInstance* instance);
XRAPI_ATTR XrResult XRAPI_CALL xrDestroyInstance(XrInstance instance);
XRAPI_ATTR int64_t XRAPI_CALL xrGetTime(XrInstance instance);
"#;

    fn write_project(dir: &Path) {
        commands::init::create_project(dir, "openxr").unwrap();
        fs::write(dir.join("include/openxr.i"), HEADER).unwrap();
        fs::write(dir.join("exports.txt"), "xrCreateInstance\nxrDestroyInstance\nxrGetTime\n").unwrap();
        let manifest = fs::read_to_string(dir.join(MANIFEST_NAME))
            .unwrap()
            .replace("namespace = \"\"", "namespace = \"xr\"")
            .replace("strip_tokens = []", "strip_tokens = [\"XRAPI_ATTR\", \"XRAPI_CALL\"]");
        fs::write(dir.join(MANIFEST_NAME), manifest).unwrap();
    }

    /// Full workflow: init, inspect, generate, clean.
    #[test]
    fn init_inspect_generate_clean_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("openxr");
        write_project(&project_path);

        let nested = project_path.join("include");
        let (manifest, project_dir) = load_manifest_required(&nested).unwrap();
        assert_eq!(project_dir, project_path);
        assert_eq!(manifest.project.namespace, "xr");

        commands::inspect::run(&project_dir, &manifest, Some("reachable"), Some("json"), None).unwrap();

        let out = commands::generate::run(&project_dir, &manifest, None, None).unwrap();
        let summary = &out.summary;
        assert_eq!(summary.stats.functions_exported, 3);
        assert_eq!(summary.struct_order, vec!["XrApplicationInfo".to_string()]);
        assert_eq!(summary.enums["Result"]["ERROR_HANDLE_INVALID"], -12);
        assert!(summary
            .entry_points
            .iter()
            .any(|e| e.symbol == "hb_xrDestroyInstance" && e.display_name == "DestroyInstance"));

        let cpp = fs::read_to_string(project_path.join("out/openxr_bridge.cpp")).unwrap();
        assert!(!cpp.contains("XRAPI_CALL"));
        assert!(cpp.contains("#include \"openxr.h\""));
        assert!(cpp.contains("j[\"engineVersion\"] = std::to_string(v.engineVersion);"));
        assert!(cpp.contains("return hb::ret_text(std::to_string(xrGetTime("));

        let json = fs::read_to_string(project_path.join("out/openxr_exports.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["project"], "openxr");
        assert_eq!(value["digest"].as_str().unwrap().len(), 64);

        commands::clean::run(&project_dir, &manifest.output.dir).unwrap();
        assert!(!project_path.join("out").exists());
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let found = HostbridgeManifest::find_and_load_within(dir.path(), Some(dir.path())).unwrap();
        let err = require_manifest(found).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_NAME));
        assert!(err.to_string().contains("hostbridge init"));
    }

    #[test]
    fn cli_parses_global_verbosity() {
        let cli = Cli::try_parse_from(["hostbridge", "inspect", "-vv", "--view", "order"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Inspect { view: Some(ref v), .. } if v == "order"
        ));
    }
}
