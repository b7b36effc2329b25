//! bomkit - bill of materials tooling for KiCad legacy schematics
//!
//! Reads a KiCad 4-5 project (`.pro` + hierarchical `.sch` sheets), lets the
//! caller attach manufacturer and supplier data to components, writes that
//! data back into the sheets without disturbing anything else, remembers it
//! in a reusable component cache and computes order quantities.
//!
//! # Quick Start
//!
//! ```no_run
//! use bomkit::{BomkitCore, UserField};
//! use std::path::Path;
//!
//! let mut project = BomkitCore::open_project(Path::new("board/")).unwrap();
//! project
//!     .document
//!     .update_component(&["R12"], &[(UserField::Supplier, "Farnell".to_string())])
//!     .unwrap();
//! BomkitCore::save(&project.document).unwrap();
//!
//! for line in project.bom().lines() {
//!     println!("{} x {}", line.total(), line.designators().join(","));
//! }
//! ```
//!
//! # Features
//!
//! - **Parser**: `$Comp` blocks, hierarchical aliases, case-insensitive sheet lookup
//! - **Rewriter**: in-place token replacement, atomic file replacement
//! - **Component cache**: content-hashed supplier records per part
//! - **BOM**: grouping, multipliers, rounding to order quantities

mod atomic;
pub mod bom;
pub mod cache;
pub mod core;
pub mod designator;
pub mod parser;
pub mod rounding;
pub mod schematic;
pub mod settings;

pub use crate::core::{AssignReport, BomkitCore, BomkitError, CacheOutcome, Project, Suggestion};
pub use bom::{compute_total, Bom, BomLine};
pub use cache::{
    CacheBackend, CacheEntry, CacheError, CacheEvent, CacheKey, ComponentCache, FileBackend,
    MemoryBackend, StoreOutcome,
};
pub use designator::InvalidDesignator;
pub use parser::{ParseError, RewriteError, SaveReport, SchematicParser, SchematicWriter};
pub use rounding::{round_up, RoundingError, RoundingPolicy};
pub use schematic::{
    ComponentFilter, ComponentRecord, Diagnostic, DiagnosticKind, DocumentError,
    SchematicDocument, Severity, SupplierData, UserField,
};
pub use settings::{ProjectSettings, SettingsError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Bom, BomkitCore, BomkitError, ComponentCache, ComponentRecord, ProjectSettings,
        RoundingPolicy, SchematicDocument, SupplierData, UserField,
    };
}
