//! Bill of materials aggregation and order quantities.
//!
//! Each [`BomLine`] keeps an explicit override flag: once the user types a
//! total by hand, changes to the global multiplier or rounding leave it
//! alone until the line's own multiplier or adder is touched again.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::designator;
use crate::rounding::RoundingPolicy;
use crate::schematic::{ComponentRecord, SchematicDocument};
use crate::settings::ProjectSettings;

/// `round_up(count * multiplier * global_multiplier + adder, base(policy))`
pub fn compute_total(
    count: u64,
    multiplier: u64,
    adder: u64,
    global_multiplier: u64,
    policy: &RoundingPolicy,
) -> u64 {
    let raw = count
        .saturating_mul(multiplier)
        .saturating_mul(global_multiplier)
        .saturating_add(adder);
    policy.apply(raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BomLine {
    designators: Vec<String>,
    pub library_reference: String,
    pub value: String,
    pub footprint: String,
    pub manufacturer: Option<String>,
    pub manufacturer_number: Option<String>,
    pub supplier: Option<String>,
    pub supplier_number: Option<String>,
    pub datasheet: Option<String>,
    multiplier: u64,
    adder: u64,
    global_multiplier: u64,
    rounding: RoundingPolicy,
    total: u64,
    overridden: bool,
}

impl BomLine {
    fn from_record(record: &ComponentRecord, settings: &ProjectSettings) -> Self {
        let mut line = Self {
            designators: Vec::new(),
            library_reference: record.library_reference.clone(),
            value: record.value.clone(),
            footprint: record.footprint.clone(),
            manufacturer: record.manufacturer.clone(),
            manufacturer_number: record.manufacturer_number.clone(),
            supplier: record.supplier.clone(),
            supplier_number: record.supplier_number.clone(),
            datasheet: record.datasheet.clone(),
            multiplier: settings.default_multiplier,
            adder: settings.default_adder,
            global_multiplier: settings.global_multiplier,
            rounding: settings.rounding,
            total: 0,
            overridden: false,
        };
        line.add_designators(&record.designators);
        line
    }

    fn add_designators(&mut self, designators: &[String]) {
        self.designators.extend(designators.iter().cloned());
        self.designators.sort_by(|a, b| designator::compare(a, b));
        self.designators.dedup();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.total = compute_total(
            self.quantity() as u64,
            self.multiplier,
            self.adder,
            self.global_multiplier,
            &self.rounding,
        );
    }

    pub fn designators(&self) -> &[String] {
        &self.designators
    }

    /// Number of placed parts.
    pub fn quantity(&self) -> usize {
        self.designators.len()
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn adder(&self) -> u64 {
        self.adder
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Discards a manual total.
    pub fn set_multiplier(&mut self, multiplier: u64) {
        self.multiplier = multiplier;
        self.overridden = false;
        self.recompute();
    }

    /// Discards a manual total.
    pub fn set_adder(&mut self, adder: u64) {
        self.adder = adder;
        self.overridden = false;
        self.recompute();
    }

    pub fn override_total(&mut self, total: u64) {
        self.total = total;
        self.overridden = true;
    }

    fn set_global_multiplier(&mut self, global_multiplier: u64) {
        self.global_multiplier = global_multiplier;
        if !self.overridden {
            self.recompute();
        }
    }

    fn set_rounding(&mut self, rounding: RoundingPolicy) {
        self.rounding = rounding;
        if !self.overridden {
            self.recompute();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Supplier(String, String),
    Part(String, String, String),
}

impl GroupKey {
    fn of(record: &ComponentRecord) -> Self {
        match &record.supplier_number {
            Some(number) => GroupKey::Supplier(
                record.supplier.clone().unwrap_or_default(),
                number.clone(),
            ),
            None => GroupKey::Part(
                record.library_reference.clone(),
                record.value.clone(),
                record.footprint.clone(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bom {
    lines: Vec<BomLine>,
    global_multiplier: u64,
    rounding: RoundingPolicy,
}

impl Bom {
    /// Group the enabled components of `document` into order lines.
    pub fn from_document(document: &SchematicDocument, settings: &ProjectSettings) -> Self {
        let mut groups: BTreeMap<GroupKey, BomLine> = BTreeMap::new();
        for record in document.components() {
            let key = record.key();
            if !document.is_enabled(&key) || settings.disabled.contains(&key) {
                continue;
            }
            match groups.get_mut(&GroupKey::of(record)) {
                Some(line) => line.add_designators(&record.designators),
                None => {
                    groups.insert(GroupKey::of(record), BomLine::from_record(record, settings));
                }
            }
        }

        let mut lines: Vec<BomLine> = groups.into_values().collect();
        lines.sort_by(order_lines);
        Self {
            lines,
            global_multiplier: settings.global_multiplier,
            rounding: settings.rounding,
        }
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    pub fn line_mut(&mut self, index: usize) -> Option<&mut BomLine> {
        self.lines.get_mut(index)
    }

    /// Line holding `designator`.
    pub fn find_line(&self, designator: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.designators.iter().any(|d| d == designator))
    }

    pub fn global_multiplier(&self) -> u64 {
        self.global_multiplier
    }

    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    /// Applies to every line without a manual total.
    pub fn set_global_multiplier(&mut self, global_multiplier: u64) {
        self.global_multiplier = global_multiplier;
        for line in &mut self.lines {
            line.set_global_multiplier(global_multiplier);
        }
    }

    pub fn set_rounding(&mut self, rounding: RoundingPolicy) {
        self.rounding = rounding;
        for line in &mut self.lines {
            line.set_rounding(rounding);
        }
    }

    /// Sum of all line totals.
    pub fn total_parts(&self) -> u64 {
        self.lines.iter().map(|l| l.total).sum()
    }
}

fn order_lines(a: &BomLine, b: &BomLine) -> Ordering {
    let supplier = |l: &BomLine| (l.supplier.is_none(), l.supplier.clone());
    supplier(a).cmp(&supplier(b)).then_with(|| {
        match (a.designators.first(), b.designators.first()) {
            (Some(x), Some(y)) => designator::compare(x, y),
            (x, y) => x.cmp(&y),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schematic::UserField;
    use std::path::PathBuf;

    fn document() -> SchematicDocument {
        let mut doc = SchematicDocument::new(vec![PathBuf::from("top.sch")]);
        let parts: [(&[&str], &str, &str); 5] = [
            (&["C1"], "100n", "C_0603"),
            (&["C2", "C12"], "100n", "C_0603"),
            (&["C3"], "10u", "C_0805"),
            (&["R1"], "10k", "R_0603"),
            (&["R2"], "10k", "R_0603"),
        ];
        for (designators, value, footprint) in parts {
            let record =
                ComponentRecord::new(designators.iter().copied(), "Device", value, footprint).unwrap();
            doc.insert(record).unwrap();
        }
        doc
    }

    #[test]
    fn test_compute_total() {
        let none = RoundingPolicy::default();
        assert_eq!(compute_total(3, 2, 1, 1, &none), 7);
        assert_eq!(compute_total(3, 2, 1, 10, &none), 61);
        let fifty = RoundingPolicy::new(5, 1).unwrap();
        assert_eq!(compute_total(3, 2, 1, 10, &fifty), 100);
        assert_eq!(compute_total(0, 2, 0, 10, &fifty), 0);
    }

    #[test]
    fn test_grouping_by_triple() {
        let bom = Bom::from_document(&document(), &ProjectSettings::default());
        let rows: Vec<Vec<String>> = bom.lines().iter().map(|l| l.designators().to_vec()).collect();
        assert_eq!(
            rows,
            vec![
                vec!["C1", "C2", "C12"],
                vec!["C3"],
                vec!["R1", "R2"],
            ]
        );
        assert_eq!(bom.lines()[0].total(), 3);
        assert_eq!(bom.total_parts(), 6);
    }

    #[test]
    fn test_grouping_by_supplier_number() {
        let mut doc = document();
        doc.update_component(
            &["C3", "R2"],
            &[
                (UserField::Supplier, "Farnell".to_string()),
                (UserField::SupplierNumber, "123".to_string()),
            ],
        )
        .unwrap();
        let bom = Bom::from_document(&doc, &ProjectSettings::default());
        assert_eq!(bom.lines().len(), 3);
        let first = &bom.lines()[0];
        assert_eq!(first.supplier.as_deref(), Some("Farnell"));
        assert_eq!(first.designators(), ["C3", "R2"]);
    }

    #[test]
    fn test_disabled_rows_excluded() {
        let mut doc = document();
        doc.set_enabled("C12", false).unwrap();
        let mut settings = ProjectSettings::default();
        settings.disabled.insert("R1".to_string());
        let bom = Bom::from_document(&doc, &settings);
        assert_eq!(bom.lines()[0].designators(), ["C1"]);
        assert_eq!(bom.find_line("R1"), None);
        assert!(bom.find_line("R2").is_some());
    }

    #[test]
    fn test_override_survives_global_changes_until_touched() {
        let mut settings = ProjectSettings::default();
        settings.rounding = RoundingPolicy::new(5, 0).unwrap();
        let mut bom = Bom::from_document(&document(), &settings);
        let idx = bom.find_line("R1").unwrap();
        assert_eq!(bom.lines()[idx].total(), 5);

        bom.line_mut(idx).unwrap().override_total(42);
        bom.set_global_multiplier(10);
        assert_eq!(bom.lines()[idx].total(), 42);
        assert!(bom.lines()[idx].is_overridden());
        assert_eq!(bom.lines()[0].total(), 30);

        bom.line_mut(idx).unwrap().set_adder(1);
        assert!(!bom.lines()[idx].is_overridden());
        assert_eq!(bom.lines()[idx].total(), 25);
    }

    #[test]
    fn test_multiplier_recomputes() {
        let mut bom = Bom::from_document(&document(), &ProjectSettings::default());
        let line = bom.line_mut(0).unwrap();
        line.set_multiplier(4);
        assert_eq!(line.total(), 12);
        bom.set_rounding(RoundingPolicy::new(1, 1).unwrap());
        assert_eq!(bom.lines()[0].total(), 20);
    }
}
