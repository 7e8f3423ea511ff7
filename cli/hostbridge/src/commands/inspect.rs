//! `hostbridge inspect`: show what the pipeline sees without generating.

use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Result};
use hostbridge_core::ClassifiedFunction;

use crate::commands::pipeline::{analyze, Analysis};
use crate::manifest::HostbridgeManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Declarations,
    Reachable,
    Order,
}

impl View {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.unwrap_or("reachable") {
            "declarations" => Ok(View::Declarations),
            "reachable" => Ok(View::Reachable),
            "order" => Ok(View::Order),
            other => bail!("unknown view '{other}' (expected declarations, reachable or order)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.unwrap_or("text") {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => bail!("unknown format '{other}' (expected text or json)"),
        }
    }
}

pub fn run(
    project_dir: &Path,
    manifest: &HostbridgeManifest,
    view: Option<&str>,
    format: Option<&str>,
    exports: Option<&str>,
) -> Result<()> {
    let view = View::parse(view)?;
    let format = Format::parse(format)?;
    let analysis = analyze(project_dir, manifest, exports)?;
    print!("{}", render(&analysis, view, format)?);
    Ok(())
}

pub fn render(analysis: &Analysis, view: View, format: Format) -> Result<String> {
    match format {
        Format::Json => {
            let value = match view {
                View::Declarations => serde_json::json!({
                    "report": analysis.report,
                    "tables": analysis.api.tables,
                }),
                View::Reachable => serde_json::to_value(&analysis.reach)?,
                View::Order => serde_json::to_value(analysis.reach.struct_order())?,
            };
            let mut out = serde_json::to_string_pretty(&value)?;
            out.push('\n');
            Ok(out)
        }
        Format::Text => Ok(match view {
            View::Declarations => declarations_text(analysis)?,
            View::Reachable => reachable_text(analysis)?,
            View::Order => order_text(analysis)?,
        }),
    }
}

fn declarations_text(analysis: &Analysis) -> Result<String> {
    let mut out = String::new();
    let report = &analysis.report;
    let tables = &analysis.api.tables;
    writeln!(
        out,
        "=== Declarations ({} parsed, {} skipped, {} file(s)) ===",
        report.parsed(),
        report.skipped(),
        report.files
    )?;

    writeln!(out, "\n--- Functions ({}) ---", tables.functions.len())?;
    for f in &tables.functions {
        let params = f
            .params
            .iter()
            .map(|p| format!("{} {}", p.declared_type, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "  {} {}({params})", f.return_type, f.name)?;
    }

    writeln!(out, "\n--- Structs ({}) ---", tables.structs.len())?;
    for s in tables.structs.values() {
        let kind = if s.is_union { "union" } else { "struct" };
        writeln!(out, "  {kind} {} ({} field(s))", s.name, s.fields.len())?;
        for field in &s.fields {
            match &field.array_size {
                Some(size) => writeln!(out, "    {} {}[{size}]", field.declared_type, field.name)?,
                None => writeln!(out, "    {} {}", field.declared_type, field.name)?,
            }
        }
    }

    writeln!(out, "\n--- Enums ({}) ---", tables.enums.len())?;
    for e in tables.enums.values() {
        writeln!(out, "  {} ({} member(s))", e.name, e.members.len())?;
    }

    writeln!(out, "\n--- Aliases ({}) ---", tables.aliases.len())?;
    for (name, target) in &tables.aliases {
        writeln!(out, "  {name} = {target}")?;
    }

    writeln!(out, "\n--- Constants ({}) ---", tables.constants.len())?;
    for (name, value) in &tables.constants {
        writeln!(out, "  {name} = {value}")?;
    }

    if !report.diagnostics.is_empty() {
        writeln!(out, "\n--- Skipped ({}) ---", report.diagnostics.len())?;
        for d in &report.diagnostics {
            writeln!(out, "  {d}")?;
        }
    }
    Ok(out)
}

fn function_line(f: &ClassifiedFunction) -> String {
    let params = f
        .params
        .iter()
        .map(|p| {
            let marker = if p.force_string { " as text" } else { "" };
            format!("{}: {}{marker}", p.name, p.classification.category)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({params}) -> {}", f.name, f.ret.category)
}

fn reachable_text(analysis: &Analysis) -> Result<String> {
    let reach = &analysis.reach;
    let mut out = String::new();
    writeln!(out, "=== Reachable API ===")?;

    writeln!(out, "\n--- Functions ({}) ---", reach.functions.len())?;
    for f in &reach.functions {
        writeln!(out, "  {}", function_line(f))?;
        let unresolved = f.unresolved_params();
        if !unresolved.is_empty() {
            writeln!(out, "    unsupported: {}", unresolved.join(", "))?;
        }
    }

    writeln!(out, "\n--- Structs ({}) ---", reach.structs.len())?;
    for s in &reach.structs {
        writeln!(out, "  {}", s.name)?;
    }
    writeln!(out, "\n--- Enums ({}) ---", reach.enums.len())?;
    for e in &reach.enums {
        writeln!(out, "  {}", e.name)?;
    }
    if !reach.function_pointers.is_empty() {
        writeln!(out, "\n--- Function pointers ({}) ---", reach.function_pointers.len())?;
        for name in &reach.function_pointers {
            writeln!(out, "  {name}")?;
        }
    }
    writeln!(out, "\n--- Native types ({}) ---", reach.native_types.len())?;
    for native in &reach.native_types {
        writeln!(out, "  {} ({:?})", native.name, native.kind)?;
    }

    for name in &reach.missing_exports {
        writeln!(out, "\nwarning: export '{name}' has no parsed prototype")?;
    }
    for name in &reach.skipped_by_prefix {
        writeln!(out, "\nskipped by prefix: {name}")?;
    }
    Ok(out)
}

fn order_text(analysis: &Analysis) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "=== Struct order ===")?;
    for (i, name) in analysis.reach.struct_order().iter().enumerate() {
        writeln!(out, "  {:>3}. {name}", i + 1)?;
    }
    Ok(out)
}
