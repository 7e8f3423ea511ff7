//! Extraction, classification and reachability for one project.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hostbridge_codegen::summary::input_digest;
use hostbridge_core::{classify_api, compute_reachable, ClassifiedApi, ReachableApi};
use hostbridge_extract::{ExtractReport, Extraction, Extractor};
use tracing::debug;

use crate::manifest::{read_exports, HostbridgeManifest};

/// Everything the front half of the pipeline produces.
pub struct Analysis {
    pub report: ExtractReport,
    /// Digest of the header texts in manifest order.
    pub digest: String,
    pub api: ClassifiedApi,
    pub reach: ReachableApi,
}

/// Resolve the export list: the command-line override wins over the manifest.
fn export_list(
    project_dir: &Path,
    manifest: &HostbridgeManifest,
    exports: Option<&str>,
) -> Result<Option<Vec<String>>> {
    let path = match (exports, manifest.input.exports.as_deref()) {
        (Some(cli), _) => PathBuf::from(cli),
        (None, Some(configured)) => project_dir.join(configured),
        (None, None) => return Ok(None),
    };
    read_exports(&path).map(Some)
}

pub fn analyze(project_dir: &Path, manifest: &HostbridgeManifest, exports: Option<&str>) -> Result<Analysis> {
    if manifest.input.headers.is_empty() {
        bail!("no headers listed under [input] in hostbridge.toml");
    }

    let extractor = Extractor::new().with_strip_tokens(manifest.input.strip_tokens.iter().cloned());
    let mut extraction = Extraction::default();
    let mut texts = Vec::with_capacity(manifest.input.headers.len());
    for header in &manifest.input.headers {
        let path = project_dir.join(header);
        let text = fs::read_to_string(&path).with_context(|| format!("reading header {}", path.display()))?;
        extraction.merge(extractor.extract_str(header, &text));
        texts.push(text);
    }
    for diagnostic in &extraction.report.diagnostics {
        debug!(%diagnostic, "skipped declaration");
    }

    let exports = export_list(project_dir, manifest, exports)?;
    let api = classify_api(extraction.tables, &manifest.bridge);
    let reach = compute_reachable(&api, exports.as_deref(), &manifest.bridge)
        .context("computing the reachable API")?;

    Ok(Analysis {
        report: extraction.report,
        digest: input_digest(&texts),
        api,
        reach,
    })
}
