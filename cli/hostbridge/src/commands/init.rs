//! `hostbridge init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{HostbridgeManifest, MANIFEST_NAME};

/// Create a new project in directory `name`, relative to cwd.
pub fn run(name: &str) -> Result<()> {
    create_project(Path::new(name), name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("include")).context("creating include/ directory")?;

    fs::write(project_dir.join(MANIFEST_NAME), HostbridgeManifest::template(name))
        .with_context(|| format!("writing {MANIFEST_NAME}"))?;

    let header = format!("include/{name}.i");
    fs::write(
        project_dir.join(&header),
        "/* Preprocessed header text: run the C preprocessor over the public header\n   and save the output here. */\n",
    )
    .with_context(|| format!("writing {header}"))?;

    fs::write(
        project_dir.join("exports.txt"),
        "# One exported function per line. Delete [input].exports from\n# hostbridge.toml to export every parsed function.\n",
    )
    .context("writing exports.txt")?;

    fs::write(project_dir.join(".gitignore"), "out/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/{MANIFEST_NAME}");
    println!("  {name}/{header}");
    println!("  {name}/exports.txt");
    println!("  {name}/.gitignore");

    Ok(())
}
