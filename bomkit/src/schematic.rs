//! In-memory schematic document.
//!
//! A [`SchematicDocument`] is the list of sheet files that make up a project
//! plus one [`ComponentRecord`] per physical component. Records are keyed by
//! their row key (sorted designators, comma joined), which stays stable across
//! reloads and is what collaborators use to address a row.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::designator::{self, InvalidDesignator};

/// Designators starting with this prefix are power and ground symbols.
pub const POWER_PREFIX: char = '#';

/// Words of attribute names, see [`UserField::from_attribute_name`].
const SUPPLIER_WORDS: [&str; 3] = ["supplier", "distributor", "vendor"];
const MANUFACTURER_WORDS: [&str; 4] = ["manufacturer", "mfr", "mfg", "mpn"];
const NUMBER_MARKERS: [&str; 8] = ["no", "nr", "ref", "num", "number", "pn", "mpn", "code"];
const FILLER_WORDS: [&str; 3] = ["part", "order", "name"];

/// Fields the user assigns to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserField {
    Manufacturer,
    ManufacturerNumber,
    Supplier,
    SupplierNumber,
    Datasheet,
}

impl UserField {
    pub const ALL: [UserField; 5] = [
        UserField::Manufacturer,
        UserField::ManufacturerNumber,
        UserField::Supplier,
        UserField::SupplierNumber,
        UserField::Datasheet,
    ];

    /// Fields stored as named custom attributes (everything but the datasheet).
    pub const CUSTOM: [UserField; 4] = [
        UserField::Manufacturer,
        UserField::ManufacturerNumber,
        UserField::Supplier,
        UserField::SupplierNumber,
    ];

    /// Column name, also used as the attribute name written into schematics
    /// and as the key inside cache records.
    pub fn column_name(&self) -> &'static str {
        match self {
            UserField::Manufacturer => "Manufacturer",
            UserField::ManufacturerNumber => "Mfr. no",
            UserField::Supplier => "Supplier",
            UserField::SupplierNumber => "Supplier no",
            UserField::Datasheet => "Datasheet",
        }
    }

    /// Recognise the role of a custom attribute from its name.
    ///
    /// The name is split into words and every word must be one this crate
    /// knows, so `supplier_ref`, `MFR PN` and `Manufacturer Part #` are
    /// understood while `Supplier Notes` stays an unrelated field. Never
    /// returns [`UserField::Datasheet`]: the datasheet always lives in
    /// attribute 3.
    pub fn from_attribute_name(name: &str) -> Option<UserField> {
        let n = name.to_ascii_lowercase();
        let words: Vec<&str> = n
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let known = |w: &&str| {
            SUPPLIER_WORDS.contains(w)
                || MANUFACTURER_WORDS.contains(w)
                || NUMBER_MARKERS.contains(w)
                || FILLER_WORDS.contains(w)
        };
        if words.is_empty() || !words.iter().all(known) {
            return None;
        }
        let is_number = n.contains('#') || words.iter().any(|w| NUMBER_MARKERS.contains(w));

        if words.iter().any(|w| SUPPLIER_WORDS.contains(w)) {
            Some(if is_number {
                UserField::SupplierNumber
            } else {
                UserField::Supplier
            })
        } else if words.iter().any(|w| MANUFACTURER_WORDS.contains(w)) {
            Some(if is_number {
                UserField::ManufacturerNumber
            } else {
                UserField::Manufacturer
            })
        } else {
            None
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for UserField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(field) = UserField::ALL.iter().find(|f| f.column_name() == s) {
            return Ok(*field);
        }
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "manufacturer" | "mfr" => Ok(UserField::Manufacturer),
            "manufacturer_number" | "mfr_no" | "mpn" => Ok(UserField::ManufacturerNumber),
            "supplier" => Ok(UserField::Supplier),
            "supplier_number" | "supplier_no" => Ok(UserField::SupplierNumber),
            "datasheet" => Ok(UserField::Datasheet),
            _ => Err(format!("Unknown field: {}", s)),
        }
    }
}

/// Supplier data entered by the user for a component.
///
/// Serialised with the original column names so cache files stay readable by
/// older tools. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierData {
    #[serde(rename = "Manufacturer", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(rename = "Mfr. no", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_number: Option<String>,
    #[serde(rename = "Supplier", default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(rename = "Supplier no", default, skip_serializing_if = "Option::is_none")]
    pub supplier_number: Option<String>,
    #[serde(rename = "Datasheet", default, skip_serializing_if = "Option::is_none")]
    pub datasheet: Option<String>,
}

impl SupplierData {
    pub fn get(&self, field: UserField) -> Option<&str> {
        let value = match field {
            UserField::Manufacturer => &self.manufacturer,
            UserField::ManufacturerNumber => &self.manufacturer_number,
            UserField::Supplier => &self.supplier,
            UserField::SupplierNumber => &self.supplier_number,
            UserField::Datasheet => &self.datasheet,
        };
        value.as_deref()
    }

    /// Set a field; an empty value clears it.
    pub fn set(&mut self, field: UserField, value: &str) {
        let slot = match field {
            UserField::Manufacturer => &mut self.manufacturer,
            UserField::ManufacturerNumber => &mut self.manufacturer_number,
            UserField::Supplier => &mut self.supplier,
            UserField::SupplierNumber => &mut self.supplier_number,
            UserField::Datasheet => &mut self.datasheet,
        };
        *slot = non_empty(value);
    }

    pub fn is_empty(&self) -> bool {
        UserField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Canonical JSON: present fields only, keys in sorted order, compact.
    ///
    /// The key order comes from the `BTreeMap`, never from the struct layout,
    /// so the content hash is stable across versions.
    pub fn canonical_json(&self) -> String {
        let map: BTreeMap<&str, &str> = UserField::ALL
            .iter()
            .filter_map(|f| self.get(*f).map(|v| (f.column_name(), v)))
            .collect();
        // Serialising a map of strings cannot fail.
        serde_json::to_string(&map).unwrap_or_default()
    }

    /// Hex SHA-256 of [`SupplierData::canonical_json`].
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// One physical component of the design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRecord {
    /// Sorted by normalised key, never empty.
    pub designators: Vec<String>,
    pub library_reference: String,
    pub value: String,
    pub footprint: String,
    pub datasheet: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_number: Option<String>,
    pub supplier: Option<String>,
    pub supplier_number: Option<String>,
}

impl ComponentRecord {
    /// Build a record, normalising and de-duplicating the designators.
    pub fn new<I, S>(
        designators: I,
        library_reference: impl Into<String>,
        value: impl Into<String>,
        footprint: impl Into<String>,
    ) -> Result<Self, InvalidDesignator>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut designators: Vec<String> = designators
            .into_iter()
            .map(|d| d.as_ref().to_string())
            .collect();
        if designators.is_empty() {
            return Err(InvalidDesignator::Malformed(String::new()));
        }
        designator::sort(&mut designators)?;
        designators.dedup();
        Ok(Self {
            designators,
            library_reference: library_reference.into(),
            value: value.into(),
            footprint: footprint.into(),
            datasheet: None,
            manufacturer: None,
            manufacturer_number: None,
            supplier: None,
            supplier_number: None,
        })
    }

    /// Row key: designators joined with commas.
    pub fn key(&self) -> String {
        self.designators.join(",")
    }

    pub fn has_designator(&self, designator: &str) -> bool {
        self.designators.iter().any(|d| d == designator)
    }

    /// `(library reference, value, footprint)`, the identity used by the cache.
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.library_reference, &self.value, &self.footprint)
    }

    pub fn field(&self, field: UserField) -> Option<&str> {
        let value = match field {
            UserField::Manufacturer => &self.manufacturer,
            UserField::ManufacturerNumber => &self.manufacturer_number,
            UserField::Supplier => &self.supplier,
            UserField::SupplierNumber => &self.supplier_number,
            UserField::Datasheet => &self.datasheet,
        };
        value.as_deref()
    }

    /// Set a user field; an empty value clears it.
    pub fn set_field(&mut self, field: UserField, value: &str) {
        let slot = match field {
            UserField::Manufacturer => &mut self.manufacturer,
            UserField::ManufacturerNumber => &mut self.manufacturer_number,
            UserField::Supplier => &mut self.supplier,
            UserField::SupplierNumber => &mut self.supplier_number,
            UserField::Datasheet => &mut self.datasheet,
        };
        *slot = non_empty(value);
    }

    pub fn supplier_data(&self) -> SupplierData {
        SupplierData {
            manufacturer: self.manufacturer.clone(),
            manufacturer_number: self.manufacturer_number.clone(),
            supplier: self.supplier.clone(),
            supplier_number: self.supplier_number.clone(),
            datasheet: self.datasheet.clone(),
        }
    }

    /// Copy every field of `data` onto the record, absent fields clear.
    pub fn apply(&mut self, data: &SupplierData) {
        for field in UserField::ALL {
            self.set_field(field, data.get(field).unwrap_or(""));
        }
    }

    pub fn clear_assignments(&mut self) {
        self.apply(&SupplierData::default());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A designator declared twice by the alias attributes of one component.
    DuplicateAlias,
    /// A component whose designators overlap an earlier one.
    OverlappingComponent,
    /// A sheet referenced by a `$Sheet` block that does not exist.
    MissingSheet,
}

/// A recoverable issue found while reading the schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("no component with designator '{0}'")]
    UnknownDesignator(String),
    #[error("component '{0}' is disabled")]
    Disabled(String),
    #[error("designators {new} overlap component {existing}")]
    Overlap { new: String, existing: String },
}

/// Position of a record: display order first, the raw row key breaks ties
/// between designators that normalise alike (`AB1` and `A1B`, `R1` and `R01`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Slot {
    sort_key: String,
    row: String,
}

/// Parsed schematic project.
#[derive(Debug, Clone, Default)]
pub struct SchematicDocument {
    files: Vec<PathBuf>,
    records: BTreeMap<Slot, ComponentRecord>,
    by_designator: HashMap<String, Slot>,
    disabled: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl SchematicDocument {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    /// Sheet files in inclusion order, root first.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn root(&self) -> Option<&Path> {
        self.files.first().map(|p| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in display order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentRecord> {
        self.records.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.records.values().map(|r| r.key())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add a record; refuses records sharing a designator with an existing one.
    pub fn insert(&mut self, record: ComponentRecord) -> Result<(), DocumentError> {
        if let Some(existing) = record
            .designators
            .iter()
            .find_map(|d| self.by_designator.get(d))
            .and_then(|slot| self.records.get(slot))
        {
            return Err(DocumentError::Overlap {
                new: record.key(),
                existing: existing.key(),
            });
        }
        let sort_key = designator::normalize(&record.designators[0])
            .unwrap_or_else(|_| record.designators[0].clone());
        let slot = Slot {
            sort_key,
            row: record.key(),
        };
        for d in &record.designators {
            self.by_designator.insert(d.clone(), slot.clone());
        }
        self.records.insert(slot, record);
        Ok(())
    }

    fn slot_of(&self, key: &str) -> Option<&Slot> {
        if let Some(slot) = self.by_designator.get(key) {
            return Some(slot);
        }
        let first = key.split(',').next()?;
        let slot = self.by_designator.get(first)?;
        match self.records.get(slot) {
            Some(record) if record.key() == key => Some(slot),
            _ => None,
        }
    }

    /// Look a record up by row key or by any one of its designators.
    pub fn get_component(&self, key: &str) -> Option<&ComponentRecord> {
        self.slot_of(key).and_then(|slot| self.records.get(slot))
    }

    pub fn get_component_mut(&mut self, key: &str) -> Option<&mut ComponentRecord> {
        let slot = self.slot_of(key)?.clone();
        self.records.get_mut(&slot)
    }

    /// All records carrying `designator`. Exactly one for a consistent document.
    pub fn records_with_designator(&self, designator: &str) -> Vec<&ComponentRecord> {
        self.records
            .values()
            .filter(|r| r.has_designator(designator))
            .collect()
    }

    pub fn set_enabled(&mut self, key: &str, enabled: bool) -> Result<(), DocumentError> {
        let row = self
            .get_component(key)
            .map(|r| r.key())
            .ok_or_else(|| DocumentError::UnknownDesignator(key.to_string()))?;
        if enabled {
            self.disabled.remove(&row);
        } else {
            self.disabled.insert(row);
        }
        Ok(())
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        match self.get_component(key) {
            Some(record) => !self.disabled.contains(&record.key()),
            None => false,
        }
    }

    /// Row keys of disabled components.
    pub fn disabled(&self) -> impl Iterator<Item = &String> {
        self.disabled.iter()
    }

    /// Apply field updates to the components named by `designators`.
    ///
    /// Each entry may be a designator or a row key. An empty value clears the
    /// field. Returns the number of distinct records changed.
    pub fn update_component<S: AsRef<str>>(
        &mut self,
        designators: &[S],
        updates: &[(UserField, String)],
    ) -> Result<usize, DocumentError> {
        let rows = self.resolve_rows(designators)?;
        for row in &rows {
            if let Some(record) = self.get_component_mut(row) {
                for (field, value) in updates {
                    record.set_field(*field, value);
                }
            }
        }
        Ok(rows.len())
    }

    /// Reset the user fields of the given enabled components.
    pub fn clear_assignments<S: AsRef<str>>(&mut self, designators: &[S]) -> Result<usize, DocumentError> {
        let rows = self.resolve_rows(designators)?;
        for row in &rows {
            if let Some(record) = self.get_component_mut(row) {
                record.clear_assignments();
            }
        }
        Ok(rows.len())
    }

    fn resolve_rows<S: AsRef<str>>(&self, designators: &[S]) -> Result<BTreeSet<String>, DocumentError> {
        let mut rows = BTreeSet::new();
        for d in designators {
            let d = d.as_ref();
            let record = self
                .get_component(d)
                .ok_or_else(|| DocumentError::UnknownDesignator(d.to_string()))?;
            let row = record.key();
            if self.disabled.contains(&row) {
                return Err(DocumentError::Disabled(row));
            }
            rows.insert(row);
        }
        Ok(rows)
    }

    /// Shared `(library reference, value, footprint)` of a selection, if uniform.
    pub fn unique_triple<S: AsRef<str>>(&self, keys: &[S]) -> Option<(String, String, String)> {
        let mut triples = keys.iter().map(|k| self.get_component(k.as_ref()).map(|r| r.triple()));
        let first = triples.next()??;
        for triple in triples {
            if triple? != first {
                return None;
            }
        }
        Some((first.0.to_string(), first.1.to_string(), first.2.to_string()))
    }

    /// Row keys of records matching every given `(field, value)` filter.
    ///
    /// Filters apply to the library reference, value and footprint.
    pub fn select_matching(&self, filter: &ComponentFilter) -> Vec<String> {
        self.records
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| r.key())
            .collect()
    }
}

/// Equality filter over the identifying fields of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    pub library_reference: Option<String>,
    pub value: Option<String>,
    pub footprint: Option<String>,
}

impl ComponentFilter {
    pub fn matches(&self, record: &ComponentRecord) -> bool {
        let check = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
        check(&self.library_reference, &record.library_reference)
            && check(&self.value, &record.value)
            && check(&self.footprint, &record.footprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(designators: &[&str], value: &str, footprint: &str) -> ComponentRecord {
        ComponentRecord::new(designators.iter().copied(), "Device:C", value, footprint).unwrap()
    }

    fn document() -> SchematicDocument {
        let mut doc = SchematicDocument::new(vec![PathBuf::from("top.sch")]);
        doc.insert(record(&["C219", "C202"], "100n", "C_0603")).unwrap();
        doc.insert(record(&["C3"], "100n", "C_0603")).unwrap();
        doc.insert(record(&["C10"], "10u", "C_0805")).unwrap();
        doc
    }

    #[test]
    fn test_record_designators_sorted_and_deduped() {
        let r = record(&["C219", "C202", "C219"], "100n", "C_0603");
        assert_eq!(r.designators, vec!["C202", "C219"]);
        assert_eq!(r.key(), "C202,C219");
    }

    #[test]
    fn test_record_requires_designator() {
        let empty: [&str; 0] = [];
        assert!(ComponentRecord::new(empty, "R", "1k", "R_0603").is_err());
    }

    #[test]
    fn test_lookup_by_key_or_alias() {
        let doc = document();
        let by_key = doc.get_component("C202,C219").unwrap();
        assert_eq!(doc.get_component("C202"), Some(by_key));
        assert_eq!(doc.get_component("C219"), Some(by_key));
        assert!(doc.get_component("C202,C3").is_none());
        assert!(doc.get_component("C999").is_none());
    }

    #[test]
    fn test_display_order_is_numeric() {
        let doc = document();
        let keys: Vec<String> = doc.keys().collect();
        assert_eq!(keys, vec!["C3", "C10", "C202,C219"]);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut doc = document();
        let err = doc.insert(record(&["C219", "C400"], "1n", "C_0402")).unwrap_err();
        assert_eq!(
            err,
            DocumentError::Overlap {
                new: "C219,C400".to_string(),
                existing: "C202,C219".to_string()
            }
        );
        assert!(doc.get_component("C400").is_none());
    }

    #[test]
    fn test_designators_normalising_alike_stay_separate() {
        let mut doc = SchematicDocument::new(vec![PathBuf::from("top.sch")]);
        doc.insert(record(&["AB1"], "1n", "C_0402")).unwrap();
        doc.insert(record(&["A1B"], "2n2", "C_0402")).unwrap();
        doc.insert(record(&["R01"], "10k", "R_0603")).unwrap();
        doc.insert(record(&["R1"], "22k", "R_0603")).unwrap();

        assert_eq!(doc.len(), 4);
        assert_eq!(doc.get_component("AB1").unwrap().value, "1n");
        assert_eq!(doc.get_component("A1B").unwrap().value, "2n2");
        assert_eq!(doc.get_component("R1").unwrap().value, "22k");
        assert_eq!(doc.records_with_designator("AB1").len(), 1);
    }

    #[test]
    fn test_update_and_clear() {
        let mut doc = document();
        let changed = doc
            .update_component(
                &["C202", "C219", "C3"],
                &[(UserField::Supplier, "Farnell".to_string())],
            )
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(doc.get_component("C3").unwrap().supplier.as_deref(), Some("Farnell"));

        doc.clear_assignments(&["C3"]).unwrap();
        assert_eq!(doc.get_component("C3").unwrap().supplier, None);
        assert_eq!(
            doc.get_component("C202").unwrap().supplier.as_deref(),
            Some("Farnell")
        );
    }

    #[test]
    fn test_disabled_rows_refuse_updates() {
        let mut doc = document();
        doc.set_enabled("C3", false).unwrap();
        assert!(!doc.is_enabled("C3"));
        let err = doc
            .update_component(&["C3"], &[(UserField::Supplier, "X".to_string())])
            .unwrap_err();
        assert_eq!(err, DocumentError::Disabled("C3".to_string()));
        doc.set_enabled("C3", true).unwrap();
        assert!(doc.is_enabled("C3"));
    }

    #[test]
    fn test_unique_triple() {
        let doc = document();
        assert_eq!(
            doc.unique_triple(&["C3", "C202"]),
            Some(("Device:C".to_string(), "100n".to_string(), "C_0603".to_string()))
        );
        assert_eq!(doc.unique_triple(&["C3", "C10"]), None);
        assert_eq!(doc.unique_triple::<&str>(&[]), None);
    }

    #[test]
    fn test_select_matching() {
        let doc = document();
        let filter = ComponentFilter {
            value: Some("100n".to_string()),
            ..Default::default()
        };
        assert_eq!(doc.select_matching(&filter), vec!["C3", "C202,C219"]);
    }

    #[test]
    fn test_attribute_name_roles() {
        assert_eq!(UserField::from_attribute_name("supplier_ref"), Some(UserField::SupplierNumber));
        assert_eq!(UserField::from_attribute_name("supplier"), Some(UserField::Supplier));
        assert_eq!(UserField::from_attribute_name("Supplier no"), Some(UserField::SupplierNumber));
        assert_eq!(UserField::from_attribute_name("Mfr. no"), Some(UserField::ManufacturerNumber));
        assert_eq!(UserField::from_attribute_name("Manufacturer"), Some(UserField::Manufacturer));
        assert_eq!(UserField::from_attribute_name("MPN"), Some(UserField::ManufacturerNumber));
        assert_eq!(UserField::from_attribute_name("Tolerance"), None);
        assert_eq!(UserField::from_attribute_name("MFR PN"), Some(UserField::ManufacturerNumber));
        assert_eq!(
            UserField::from_attribute_name("Manufacturer Part #"),
            Some(UserField::ManufacturerNumber)
        );
        assert_eq!(UserField::from_attribute_name("Supplier Notes"), None);
        assert_eq!(UserField::from_attribute_name("Supplier Nominal"), None);
        for field in UserField::CUSTOM {
            assert_eq!(UserField::from_attribute_name(field.column_name()), Some(field));
        }
    }

    #[test]
    fn test_content_hash_is_order_independent() {
        let mut a = SupplierData::default();
        a.set(UserField::Supplier, "Farnell");
        a.set(UserField::SupplierNumber, "1439758");
        let mut b = SupplierData::default();
        b.set(UserField::SupplierNumber, "1439758");
        b.set(UserField::Supplier, "Farnell");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(
            a.canonical_json(),
            r#"{"Supplier":"Farnell","Supplier no":"1439758"}"#
        );
        b.set(UserField::Manufacturer, "Murata");
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
