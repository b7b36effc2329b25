//! Writes user fields back into legacy schematic files.
//!
//! Each sheet is re-scanned and only the value tokens of attribute lines that
//! actually change are replaced. Every other byte, including line endings,
//! is copied through, so saving an unmodified document is a no-op and saving
//! twice gives the same bytes as saving once.
//!
//! Fields the document holds but the sheet lacks are appended as new named
//! attributes just before the first body line of the component.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::atomic::write_atomically;
use crate::parser::legacy::{content, quote, ComponentBlock, FieldAttribute, ScannedSheet};
use crate::parser::{datasheet_value, read_sheet, scan_sheet, ParseError};
use crate::schematic::{non_empty, ComponentRecord, SchematicDocument, UserField};

/// Attribute index holding the datasheet.
const DATASHEET_INDEX: u32 = 3;
/// First index of user-defined attributes.
const FIRST_CUSTOM_INDEX: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{path}:{line}: no component in the document matches {designators}")]
    NoMatchingComponent {
        path: PathBuf,
        line: usize,
        designators: String,
    },
    #[error("{path}:{line}: {designators} match several components: {}", .matches.join("; "))]
    AmbiguousComponent {
        path: PathBuf,
        line: usize,
        designators: String,
        matches: Vec<String>,
    },
    #[error("{path}: fields {} of {designator} could not be written", FieldList(.fields))]
    UnaccountedFields {
        path: PathBuf,
        designator: String,
        fields: Vec<UserField>,
    },
}

struct FieldList<'a>(&'a [UserField]);

impl fmt::Display for FieldList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|field| field.column_name()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Outcome of [`SchematicWriter::save`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub rewritten: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Pending edits to one sheet, by line index.
#[derive(Default)]
struct Edits {
    replaced: HashMap<usize, String>,
    inserted: HashMap<usize, Vec<String>>,
}

impl Edits {
    fn is_empty(&self) -> bool {
        self.replaced.is_empty() && self.inserted.is_empty()
    }

    fn replace_value(&mut self, sheet: &ScannedSheet<'_>, field: &FieldAttribute, value: &str) {
        let raw = sheet.lines[field.line];
        let span = field.value_span.clone();
        let line = format!("{}{}{}", &raw[..span.start], quote(value), &raw[span.end..]);
        self.replaced.insert(field.line, line);
    }

    fn apply(&self, sheet: &ScannedSheet<'_>) -> String {
        let mut out = String::new();
        for (idx, raw) in sheet.lines.iter().enumerate() {
            if let Some(lines) = self.inserted.get(&idx) {
                let terminator = match &raw[content(raw).len()..] {
                    "" => "\n",
                    t => t,
                };
                for line in lines {
                    out.push_str(line);
                    out.push_str(terminator);
                }
            }
            match self.replaced.get(&idx) {
                Some(line) => out.push_str(line),
                None => out.push_str(raw),
            }
        }
        out
    }
}

pub struct SchematicWriter;

impl SchematicWriter {
    /// Write every sheet of `document` whose content changes.
    ///
    /// Files are replaced atomically. The first error stops the save; sheets
    /// already written stay written.
    pub fn save(document: &SchematicDocument) -> Result<SaveReport, RewriteError> {
        let mut report = SaveReport::default();
        for path in document.files() {
            let text = read_sheet(path)?;
            let updated = Self::rewrite_sheet(&text, path, document)?;
            if updated == text {
                tracing::debug!("{} unchanged", path.display());
                report.unchanged.push(path.clone());
                continue;
            }
            write_atomically(path, updated.as_bytes()).map_err(|source| RewriteError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::info!("Updated {}", path.display());
            report.rewritten.push(path.clone());
        }
        Ok(report)
    }

    /// Return `text` with the user fields of `document` written in.
    pub fn rewrite_sheet(
        text: &str,
        path: &Path,
        document: &SchematicDocument,
    ) -> Result<String, RewriteError> {
        let sheet = scan_sheet(text, path)?;
        let mut edits = Edits::default();

        for block in sheet.components.iter().filter(|b| !b.is_power_symbol()) {
            let record = matching_record(document, block, path)?;
            plan_block(&sheet, block, record, &mut edits)?;
        }

        if edits.is_empty() {
            return Ok(text.to_string());
        }
        Ok(edits.apply(&sheet))
    }
}

fn matching_record<'d>(
    document: &'d SchematicDocument,
    block: &ComponentBlock,
    path: &Path,
) -> Result<&'d ComponentRecord, RewriteError> {
    let designators = block.designators();
    let mut matches: Vec<&ComponentRecord> = Vec::new();
    for designator in &designators {
        for record in document.records_with_designator(designator) {
            if !matches.iter().any(|m| m.key() == record.key()) {
                matches.push(record);
            }
        }
    }

    match matches.as_slice() {
        [record] => Ok(*record),
        [] => Err(RewriteError::NoMatchingComponent {
            path: path.to_path_buf(),
            line: block.start + 1,
            designators: designators.join(","),
        }),
        _ => Err(RewriteError::AmbiguousComponent {
            path: path.to_path_buf(),
            line: block.start + 1,
            designators: designators.join(","),
            matches: matches.iter().map(|m| m.key()).collect(),
        }),
    }
}

fn plan_block(
    sheet: &ScannedSheet<'_>,
    block: &ComponentBlock,
    record: &ComponentRecord,
    edits: &mut Edits,
) -> Result<(), RewriteError> {
    let mut missing: Vec<UserField> = Vec::new();

    match block.field(DATASHEET_INDEX) {
        Some(field) => {
            if datasheet_value(&field.value) != record.datasheet {
                edits.replace_value(sheet, field, record.datasheet.as_deref().unwrap_or(""));
            }
        }
        None if record.datasheet.is_some() => missing.push(UserField::Datasheet),
        None => {}
    }

    missing.extend(
        UserField::CUSTOM
            .into_iter()
            .filter(|f| record.field(*f).is_some()),
    );

    for field in block.fields.iter().filter(|f| f.index >= FIRST_CUSTOM_INDEX) {
        let Some(role) = field.name.as_deref().and_then(UserField::from_attribute_name) else {
            continue;
        };
        let wanted = record.field(role);
        if non_empty(&field.value).as_deref() != wanted {
            edits.replace_value(sheet, field, wanted.unwrap_or(""));
        }
        missing.retain(|m| *m != role);
    }

    if missing.is_empty() {
        return Ok(());
    }

    let Some(body) = block.first_body_line else {
        return Err(RewriteError::UnaccountedFields {
            path: sheet.path.clone(),
            designator: record.key(),
            fields: missing,
        });
    };

    let (x, y) = block.position();
    let mut next = block
        .max_field_index()
        .map_or(FIRST_CUSTOM_INDEX, |max| (max + 1).max(FIRST_CUSTOM_INDEX));
    let lines = edits.inserted.entry(body).or_default();
    for role in missing {
        let value = record.field(role).unwrap_or("");
        if role == UserField::Datasheet {
            lines.push(field_line(DATASHEET_INDEX, value, None, &x, &y));
        } else {
            lines.push(field_line(next, value, Some(role.column_name()), &x, &y));
            next += 1;
        }
    }
    Ok(())
}

/// A hidden attribute line in eeschema's layout.
fn field_line(index: u32, value: &str, name: Option<&str>, x: &str, y: &str) -> String {
    let mut line = format!("F {} {} H {:<3} {:<3} 50  0001 C CNN", index, quote(value), x, y);
    if let Some(name) = name {
        line.push(' ');
        line.push_str(&quote(name));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SchematicParser;

    const SHEET: &str = "EESchema Schematic File Version 4\n\
$Comp\n\
L Device:R R1\n\
U 1 1 5C1D2E3F\n\
P 5000 3000\n\
F 0 \"R1\" H 5070 3046 50  0000 L CNN\n\
F 1 \"10k\" H 5070 2955 50  0000 L CNN\n\
F 2 \"Resistor_SMD:R_0603\" V 4930 3000 50  0001 C CNN\n\
F 3 \"~\" H 5000 3000 50  0001 C CNN\n\
F 4 \"Farnell\" H 5000 3000 50  0001 C CNN \"Supplier\"\n\
\t1    5000 3000\n\
\t1    0    0    -1  \n\
$EndComp\n\
$Comp\n\
L power:GND #PWR01\n\
F 0 \"#PWR01\" H 5000 2750 50  0001 C CNN\n\
\t1    5000 2750\n\
$EndComp\n\
$EndSCHEMATC\n";

    fn document(text: &str) -> SchematicDocument {
        let mut doc = SchematicDocument::new(vec![PathBuf::from("t.sch")]);
        SchematicParser::parse_sheet(text, Path::new("t.sch"), &mut doc).unwrap();
        doc
    }

    fn rewrite(text: &str, doc: &SchematicDocument) -> String {
        SchematicWriter::rewrite_sheet(text, Path::new("t.sch"), doc).unwrap()
    }

    #[test]
    fn test_unmodified_document_is_identity() {
        let doc = document(SHEET);
        assert_eq!(rewrite(SHEET, &doc), SHEET);
    }

    #[test]
    fn test_existing_field_replaced_in_place() {
        let mut doc = document(SHEET);
        doc.update_component(&["R1"], &[(UserField::Supplier, "Mouser".to_string())])
            .unwrap();
        let out = rewrite(SHEET, &doc);
        assert!(out.contains("F 4 \"Mouser\" H 5000 3000 50  0001 C CNN \"Supplier\"\n"));
        assert_eq!(out.lines().count(), SHEET.lines().count());
    }

    #[test]
    fn test_missing_fields_inserted_before_body() {
        let mut doc = document(SHEET);
        doc.update_component(
            &["R1"],
            &[
                (UserField::SupplierNumber, "9330399".to_string()),
                (UserField::Manufacturer, "Yageo".to_string()),
            ],
        )
        .unwrap();
        let out = rewrite(SHEET, &doc);
        let expected = "F 4 \"Farnell\" H 5000 3000 50  0001 C CNN \"Supplier\"\n\
F 5 \"Yageo\" H 5000 3000 50  0001 C CNN \"Manufacturer\"\n\
F 6 \"9330399\" H 5000 3000 50  0001 C CNN \"Supplier no\"\n\
\t1    5000 3000\n";
        assert!(out.contains(expected), "{}", out);

        let reparsed = document(&out);
        let r1 = reparsed.get_component("R1").unwrap();
        assert_eq!(r1.manufacturer.as_deref(), Some("Yageo"));
        assert_eq!(r1.supplier_number.as_deref(), Some("9330399"));
        assert_eq!(rewrite(&out, &reparsed), out);
    }

    #[test]
    fn test_cleared_field_written_empty() {
        let mut doc = document(SHEET);
        doc.clear_assignments(&["R1"]).unwrap();
        let out = rewrite(SHEET, &doc);
        assert!(out.contains("F 4 \"\" H 5000 3000 50  0001 C CNN \"Supplier\"\n"));
        assert!(out.contains("F 3 \"~\" H"));
    }

    #[test]
    fn test_datasheet_replaced_and_escaped() {
        let mut doc = document(SHEET);
        doc.update_component(
            &["R1"],
            &[(UserField::Datasheet, "C:\\docs\\r.pdf".to_string())],
        )
        .unwrap();
        let out = rewrite(SHEET, &doc);
        assert!(out.contains("F 3 \"C:\\\\docs\\\\r.pdf\" H 5000 3000"));
        let reparsed = document(&out);
        assert_eq!(
            reparsed.get_component("R1").unwrap().datasheet.as_deref(),
            Some("C:\\docs\\r.pdf")
        );
    }

    #[test]
    fn test_crlf_preserved() {
        let crlf = SHEET.replace('\n', "\r\n");
        let mut doc = document(&crlf);
        doc.update_component(&["R1"], &[(UserField::Manufacturer, "Yageo".to_string())])
            .unwrap();
        let out = rewrite(&crlf, &doc);
        assert!(out.contains("\"Manufacturer\"\r\n\t1    5000 3000\r\n"));
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_component_missing_from_document() {
        let doc = SchematicDocument::new(vec![PathBuf::from("t.sch")]);
        let err = SchematicWriter::rewrite_sheet(SHEET, Path::new("t.sch"), &doc).unwrap_err();
        assert!(matches!(err, RewriteError::NoMatchingComponent { line: 2, .. }));
    }

    #[test]
    fn test_designators_normalising_alike_round_trip() {
        let text = "$Comp\n\
L Device:C AB1\n\
F 0 \"AB1\" H 0 0 50  0000 L CNN\n\
F 1 \"1n\" H 0 0 50  0000 L CNN\n\
\t1    0 0\n\
$EndComp\n\
$Comp\n\
L Device:C A1B\n\
F 0 \"A1B\" H 0 0 50  0000 L CNN\n\
F 1 \"2n2\" H 0 0 50  0000 L CNN\n\
\t1    0 0\n\
$EndComp\n";
        let doc = document(text);
        assert_eq!(doc.len(), 2);
        assert!(doc.diagnostics().is_empty());
        assert_eq!(rewrite(text, &doc), text);
    }

    #[test]
    fn test_unrelated_supplier_attribute_left_alone() {
        let text = "$Comp\n\
L Device:R R1\n\
P 100 200\n\
F 0 \"R1\" H 0 0 50  0000 L CNN\n\
F 1 \"1k\" H 0 0 50  0000 L CNN\n\
F 4 \"check stock weekly\" H 100 200 50  0001 C CNN \"Supplier Notes\"\n\
\t1    100 200\n\
$EndComp\n";
        let mut doc = document(text);
        assert_eq!(doc.get_component("R1").unwrap().supplier_number, None);

        doc.update_component(&["R1"], &[(UserField::SupplierNumber, "9330399".to_string())])
            .unwrap();
        let out = rewrite(text, &doc);
        assert!(out.contains("F 4 \"check stock weekly\" H 100 200 50  0001 C CNN \"Supplier Notes\"\n"));
        assert!(out.contains("F 5 \"9330399\" H 100 200 50  0001 C CNN \"Supplier no\"\n"));
    }

    #[test]
    fn test_fields_without_body_are_reported() {
        let text = "$Comp\nL Device:R R1\nF 1 \"1k\" H 0 0 50  0000 L CNN\n$EndComp\n";
        let mut doc = document(text);
        doc.update_component(&["R1"], &[(UserField::Supplier, "Farnell".to_string())])
            .unwrap();
        let err = SchematicWriter::rewrite_sheet(text, Path::new("t.sch"), &doc).unwrap_err();
        match err {
            RewriteError::UnaccountedFields { fields, .. } => {
                assert_eq!(fields, vec![UserField::Supplier])
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
