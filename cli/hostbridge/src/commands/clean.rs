//! `hostbridge clean`: remove generated outputs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::manifest::check_output_dir;

/// Remove `out_dir`, which must be a subdirectory of the project directory.
pub fn run(project_dir: &Path, out_dir: &str) -> Result<()> {
    check_output_dir(out_dir)?;
    let out_dir = project_dir.join(out_dir);
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir).with_context(|| format!("removing {}", out_dir.display()))?;
        println!("Removed {}", out_dir.display());
    } else {
        println!("Already clean: {} does not exist", out_dir.display());
    }
    Ok(())
}
