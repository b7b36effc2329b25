//! Project and hierarchical sheet discovery.
//!
//! The root sheet of a project `board.pro` is `board.sch` next to it. Every
//! `$Sheet` block names a sub-sheet file in its `F1` attribute; those are
//! followed recursively, depth first, each file visited once.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::parser::legacy::{content, tokenize};
use crate::parser::{read_sheet, ParseError};
use crate::schematic::{Diagnostic, DiagnosticKind, Severity};

const MAX_PROJECT_DEPTH: usize = 20;

/// Recursively find `*.pro` files below `dir`, sorted.
pub fn find_projects(dir: &Path) -> Result<Vec<PathBuf>, ParseError> {
    let mut projects = Vec::new();
    walk_dir(dir, &mut projects, 0)?;
    projects.sort();
    if projects.is_empty() {
        return Err(ParseError::ProjectNotFound(dir.to_path_buf()));
    }
    Ok(projects)
}

fn walk_dir(dir: &Path, projects: &mut Vec<PathBuf>, depth: usize) -> Result<(), ParseError> {
    if depth > MAX_PROJECT_DEPTH {
        return Ok(());
    }
    let entries = fs::read_dir(dir).map_err(|e| ParseError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ParseError::io(dir, e))?.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "target" || name == "build" {
                continue;
            }
            walk_dir(&path, projects, depth + 1)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("pro") {
            projects.push(path);
        }
    }
    Ok(())
}

/// Find `name` inside `dir`, ignoring ASCII case.
pub fn resolve_case_insensitive(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if exact.is_file() {
        return Some(exact);
    }
    let wanted = name.to_lowercase();
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.to_lowercase() == wanted)
                    .unwrap_or(false)
        })
}

/// Root sheet of a `.pro` project file.
pub fn root_sheet(project: &Path) -> Result<PathBuf, ParseError> {
    let stem = project
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let sheet = format!("{}.sch", stem);
    let dir = project.parent().unwrap_or_else(|| Path::new("."));
    resolve_case_insensitive(dir, &sheet).ok_or_else(|| ParseError::RootSheetNotFound {
        project: project.to_path_buf(),
        sheet,
    })
}

/// Sub-sheet file names referenced by `$Sheet` blocks, with 1-based line numbers.
pub fn sheet_references(text: &str) -> Vec<(String, usize)> {
    let mut references = Vec::new();
    let mut in_sheet = false;
    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let line = content(raw);
        if line.starts_with("$EndSheet") {
            in_sheet = false;
        } else if line.starts_with("$Sheet") {
            in_sheet = true;
        } else if in_sheet && line.starts_with("F1 ") {
            if let Some(name) = tokenize(line).get(1) {
                references.push((name.text(), idx + 1));
            }
        }
    }
    references
}

/// Ordered, de-duplicated list of sheets reachable from `root`.
pub fn collect_sheets(root: &Path) -> Result<(Vec<PathBuf>, Vec<Diagnostic>), ParseError> {
    let mut collector = SheetCollector::default();
    collector.visit(root)?;
    Ok((collector.files, collector.diagnostics))
}

#[derive(Default)]
struct SheetCollector {
    files: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl SheetCollector {
    fn visit(&mut self, path: &Path) -> Result<(), ParseError> {
        let identity = fs::canonicalize(path).map_err(|e| ParseError::io(path, e))?;
        if !self.seen.insert(identity) {
            return Ok(());
        }
        self.files.push(path.to_path_buf());

        let text = read_sheet(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for (name, line) in sheet_references(&text) {
            let relative = Path::new(&name);
            let parent = dir.join(relative.parent().unwrap_or_else(|| Path::new("")));
            let file_name = relative
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&name);
            match resolve_case_insensitive(&parent, file_name) {
                Some(sub) => self.visit(&sub)?,
                None => {
                    let message = format!("sub-sheet '{}' not found", name);
                    tracing::warn!("{}:{}: {}", path.display(), line, message);
                    self.diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        kind: DiagnosticKind::MissingSheet,
                        message,
                        file: path.to_path_buf(),
                        line,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Sheets of every project reachable from `root`, in inclusion order.
pub fn project_sheets(root: &Path) -> Result<(Vec<PathBuf>, Vec<Diagnostic>), ParseError> {
    let roots = if root.is_dir() {
        find_projects(root)?
            .iter()
            .map(|project| root_sheet(project))
            .collect::<Result<Vec<_>, _>>()?
    } else if root.extension().and_then(|e| e.to_str()) == Some("pro") {
        vec![root_sheet(root)?]
    } else if root.is_file() {
        vec![root.to_path_buf()]
    } else {
        return Err(ParseError::ProjectNotFound(root.to_path_buf()));
    };

    let mut collector = SheetCollector::default();
    for sheet in roots {
        collector.visit(&sheet)?;
    }
    Ok((collector.files, collector.diagnostics))
}
