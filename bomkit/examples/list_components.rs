//! List the components of a KiCad legacy project with their supplier data.

use bomkit::prelude::*;
use std::path::Path;

fn main() -> Result<(), BomkitError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/amp_board".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("Project not found: {}", path.display());
        eprintln!("Usage: cargo run --example list_components [path/to/project]");
        std::process::exit(1);
    }

    let project = BomkitCore::open_project(path)?;
    println!("Sheets:");
    for file in project.document.files() {
        println!("  {}", file.display());
    }
    println!();

    for record in project.document.components() {
        println!(
            "{:<16} {:<24} {:<10} {}",
            record.key(),
            record.library_reference,
            record.value,
            record.supplier_number.as_deref().unwrap_or("-")
        );
    }

    for diagnostic in project.document.diagnostics() {
        println!(
            "warning: {}:{}: {}",
            diagnostic.file.display(),
            diagnostic.line,
            diagnostic.message
        );
    }
    Ok(())
}
