//! Source text assembly and output files.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CodegenError, Result};
use crate::summary::ExportSummary;

/// Indenting line writer for generated C++.
#[derive(Debug, Default)]
pub struct CppWriter {
    buf: String,
    depth: usize,
}

impl CppWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str("    ");
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
        self
    }

    /// Write `text` and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.line(text);
        self.depth += 1;
        self
    }

    /// Dedent, then write `text`.
    pub fn close(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self.line(text)
    }

    /// Dedent, write `text`, indent again (`} else {`).
    pub fn close_open(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.close(text);
        self.depth += 1;
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// One generated file, named relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub name: String,
    pub contents: String,
}

/// Everything one generation run produces.
#[derive(Debug, Clone)]
pub struct BridgeOutput {
    pub files: Vec<OutputFile>,
    pub summary: ExportSummary,
}

impl BridgeOutput {
    pub fn file(&self, name: &str) -> Option<&OutputFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Write every file into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|source| CodegenError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(&file.name);
            std::fs::write(&path, &file.contents).map_err(|source| CodegenError::Write {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        info!(dir = %dir.display(), files = written.len(), "wrote bridge outputs");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_indents_blocks() {
        let mut w = CppWriter::new();
        w.open("int f() {").line("return 1;").close("}").blank();
        assert_eq!(w.finish(), "int f() {\n    return 1;\n}\n\n");
    }

    #[test]
    fn else_branches_keep_depth() {
        let mut w = CppWriter::new();
        w.open("if (a) {").line("x();").close_open("} else {").line("y();").close("}");
        assert_eq!(w.finish(), "if (a) {\n    x();\n} else {\n    y();\n}\n");
    }

    #[test]
    fn close_never_underflows() {
        let mut w = CppWriter::new();
        w.close("}");
        assert_eq!(w.finish(), "}\n");
    }
}
