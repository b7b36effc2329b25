pub mod legacy;
pub mod sheets;
pub mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::designator::InvalidDesignator;
use crate::schematic::{
    ComponentRecord, Diagnostic, DiagnosticKind, SchematicDocument, Severity, UserField,
};

pub use legacy::{scan_sheet, ComponentBlock, ScannedSheet};
pub use writer::{RewriteError, SaveReport, SchematicWriter};

/// Errors while locating or reading schematic files.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no KiCad project file (*.pro) found in {0}")]
    ProjectNotFound(PathBuf),
    #[error("root sheet '{sheet}' of project {project} not found")]
    RootSheetNotFound { project: PathBuf, sheet: String },
    #[error("{path}:{line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{path}:{line}: {source}")]
    Designator {
        path: PathBuf,
        line: usize,
        #[source]
        source: InvalidDesignator,
    },
}

impl ParseError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ParseError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub(crate) fn read_sheet(path: &Path) -> Result<String, ParseError> {
    fs::read_to_string(path).map_err(|e| ParseError::io(path, e))
}

/// Datasheet attribute text as seen by collaborators: `~` and `""` mean none.
pub(crate) fn datasheet_value(text: &str) -> Option<String> {
    match text {
        "" | "~" => None,
        other => Some(other.to_string()),
    }
}

/// Parser for KiCad 4-5 legacy schematic projects.
pub struct SchematicParser;

impl SchematicParser {
    /// Parse a project.
    ///
    /// `root` may be a directory holding `*.pro` files, a `.pro` file or a
    /// `.sch` file used directly as the root sheet.
    pub fn parse(root: &Path) -> Result<SchematicDocument, ParseError> {
        let (files, diagnostics) = sheets::project_sheets(root)?;
        let mut document = Self::parse_files(files)?;
        for diagnostic in diagnostics {
            document.push_diagnostic(diagnostic);
        }
        Ok(document)
    }

    /// Parse an explicit, already ordered list of sheet files.
    pub fn parse_files(files: Vec<PathBuf>) -> Result<SchematicDocument, ParseError> {
        let mut document = SchematicDocument::new(files.clone());
        for path in &files {
            tracing::debug!("Parsing {}", path.display());
            let text = read_sheet(path)?;
            Self::parse_sheet(&text, path, &mut document)?;
        }
        tracing::debug!(
            "Parsed {} components from {} sheets",
            document.len(),
            files.len()
        );
        Ok(document)
    }

    /// Add the components of one sheet to `document`.
    pub fn parse_sheet(
        text: &str,
        path: &Path,
        document: &mut SchematicDocument,
    ) -> Result<(), ParseError> {
        let sheet = scan_sheet(text, path)?;

        for (designator, idx) in &sheet.duplicate_aliases {
            let message = format!(
                "designator {} is declared more than once in the alias attributes of one component, keeping the first",
                designator
            );
            tracing::warn!("{}:{}: {}", path.display(), idx + 1, message);
            document.push_diagnostic(Diagnostic {
                severity: Severity::Warning,
                kind: DiagnosticKind::DuplicateAlias,
                message,
                file: path.to_path_buf(),
                line: idx + 1,
            });
        }

        for block in sheet.components.iter().filter(|b| !b.is_power_symbol()) {
            let record = build_record(block, path)?;
            if let Err(err) = document.insert(record) {
                let message = format!("{}, keeping the first definition", err);
                tracing::warn!("{}:{}: {}", path.display(), block.start + 1, message);
                document.push_diagnostic(Diagnostic {
                    severity: Severity::Warning,
                    kind: DiagnosticKind::OverlappingComponent,
                    message,
                    file: path.to_path_buf(),
                    line: block.start + 1,
                });
            }
        }
        Ok(())
    }
}

fn build_record(block: &ComponentBlock, path: &Path) -> Result<ComponentRecord, ParseError> {
    let value = block.field(1).map(|f| f.value.as_str()).unwrap_or("");
    let footprint = block.field(2).map(|f| f.value.as_str()).unwrap_or("");

    let mut record = ComponentRecord::new(
        block.designators(),
        block.library_reference(),
        value,
        footprint,
    )
    .map_err(|source| ParseError::Designator {
        path: path.to_path_buf(),
        line: block.start + 1,
        source,
    })?;

    record.datasheet = block.field(3).and_then(|f| datasheet_value(&f.value));

    for field in block.fields.iter().filter(|f| f.index >= 4) {
        let Some(role) = field.name.as_deref().and_then(UserField::from_attribute_name) else {
            continue;
        };
        if record.field(role).is_none() {
            record.set_field(role, &field.value);
        }
    }
    Ok(record)
}
