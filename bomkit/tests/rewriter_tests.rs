//! Round-trip tests: parse, edit, save, re-parse

use bomkit::prelude::*;
use bomkit::SchematicParser;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Copy the fixture project into a scratch directory.
fn scratch_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for entry in fs::read_dir(fixture_path("amp_board")).unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
    }
    dir
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_save_without_edits_changes_nothing() {
    let dir = scratch_project();
    let before_root = read(&dir.path().join("amp_board.sch"));
    let before_channel = read(&dir.path().join("channel.sch"));

    let doc = SchematicParser::parse(dir.path()).unwrap();
    let report = BomkitCore::save(&doc).unwrap();
    assert!(report.rewritten.is_empty());
    assert_eq!(report.unchanged.len(), 2);

    assert_eq!(read(&dir.path().join("amp_board.sch")), before_root);
    assert_eq!(read(&dir.path().join("channel.sch")), before_channel);
}

#[test]
fn test_edits_survive_reload() {
    let dir = scratch_project();
    let mut doc = SchematicParser::parse(dir.path()).unwrap();
    doc.update_component(
        &["C219"],
        &[
            (UserField::Manufacturer, "Murata".to_string()),
            (UserField::ManufacturerNumber, "GRM188R71H104KA93D".to_string()),
        ],
    )
    .unwrap();
    doc.update_component(&["R2"], &[(UserField::Supplier, "Mouser".to_string())])
        .unwrap();
    doc.update_component(&["R1"], &[(UserField::SupplierNumber, String::new())])
        .unwrap();

    let report = BomkitCore::save(&doc).unwrap();
    assert_eq!(report.rewritten.len(), 2);

    let channel = read(&dir.path().join("channel.sch"));
    assert!(channel.contains(
        "F 4 \"Murata\" H 4000 3000 50  0001 C CNN \"Manufacturer\"\n\
F 5 \"GRM188R71H104KA93D\" H 4000 3000 50  0001 C CNN \"Mfr. no\"\n\
\t1    4000 3000\n"
    ));

    let reloaded = SchematicParser::parse(dir.path()).unwrap();
    let c202 = reloaded.get_component("C202").unwrap();
    assert_eq!(c202.manufacturer.as_deref(), Some("Murata"));
    assert_eq!(c202.manufacturer_number.as_deref(), Some("GRM188R71H104KA93D"));
    assert_eq!(
        reloaded.get_component("R2").unwrap().supplier.as_deref(),
        Some("Mouser")
    );
    assert_eq!(reloaded.get_component("R1").unwrap().supplier_number, None);
    assert_eq!(
        reloaded.get_component("R1").unwrap().supplier.as_deref(),
        Some("Farnell")
    );
}

#[test]
fn test_second_save_is_identical() {
    let dir = scratch_project();
    let mut doc = SchematicParser::parse(dir.path()).unwrap();
    doc.update_component(&["U1"], &[(UserField::Manufacturer, "onsemi".to_string())])
        .unwrap();
    BomkitCore::save(&doc).unwrap();
    let first = read(&dir.path().join("channel.sch"));

    // Both units of U1 carry the new value.
    assert_eq!(first.matches("\"onsemi\"").count(), 2);

    let reloaded = SchematicParser::parse(dir.path()).unwrap();
    let report = BomkitCore::save(&reloaded).unwrap();
    assert!(report.rewritten.is_empty());
    assert_eq!(read(&dir.path().join("channel.sch")), first);
}

#[test]
fn test_only_touched_lines_change() {
    let dir = scratch_project();
    let before = read(&dir.path().join("amp_board.sch"));
    let mut doc = SchematicParser::parse(dir.path()).unwrap();
    doc.update_component(&["R1"], &[(UserField::Supplier, "RS".to_string())])
        .unwrap();
    BomkitCore::save(&doc).unwrap();
    let after = read(&dir.path().join("amp_board.sch"));

    let changed: Vec<(&str, &str)> = before
        .lines()
        .zip(after.lines())
        .filter(|(a, b)| a != b)
        .collect();
    assert_eq!(
        changed,
        vec![(
            "F 4 \"Farnell\" H 3000 2000 50  0001 C CNN \"Supplier\"",
            "F 4 \"RS\" H 3000 2000 50  0001 C CNN \"Supplier\""
        )]
    );
    assert_eq!(before.lines().count(), after.lines().count());
}
