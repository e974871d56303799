//! Record building: classify a logical table, serialize its cells
//! canonically, and derive its stable identity.
//!
//! ## Identity
//!
//! The hash covers `(batch_no, source pages, serialized cells)` and nothing
//! else, so rebuilding the same table always yields the same key while any
//! change to a row, row order, or page membership yields a different one.
//! The digest takes the full ordered page list — the human-readable
//! `P<first>-<last>` prefix alone cannot tell `(348,349,350)` from another
//! group sharing its endpoints. The build timestamp stays out of the hash
//! input — a re-run must be recognisable as the same extraction. SHA-256 is
//! used for its stable, well-distributed output; the key is an audit tag,
//! not a security boundary.

use crate::output::TableRecord;
use crate::pagespec::PageUnit;
use crate::table::LogicalTable;
use chrono::Local;
use sha2::{Digest, Sha256};

/// Fixed step label for the pharmaceutical workflow this feeds.
pub const STEP_NAME: &str = "Equipment-Calibration-Check";
/// Fixed provenance label for records produced from scanned batch records.
pub const DATA_SOURCE: &str = "BMR-PDF-Scan";
/// Fixed record classification.
pub const TABLE_TYPE: &str = "Checklist";

/// Fallback table name when no checklist area banner was recognized.
const DEFAULT_TABLE_NAME: &str = "Equipment Calibration Table";

/// Build the persisted-record descriptor for one logical table.
pub fn build_record(table: &LogicalTable, experiment_id: i64, batch_no: i64) -> TableRecord {
    let table_data = serialize_cells(table);
    let hash = record_hash(batch_no, &table.source_pages, &table_data);

    TableRecord {
        experiment_id,
        batch_no,
        step_name: STEP_NAME.to_string(),
        table_name: classify(table),
        data_source: DATA_SOURCE.to_string(),
        table_data,
        created_on: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        hash,
        is_deleted: false,
        table_type: TABLE_TYPE.to_string(),
        source_pages: table.source_pages.clone(),
    }
}

/// Classification is a pure function of table content: the recognized area
/// banner names the checklist; without one, the fixed calibration header
/// implies the generic name. Page numbers play no part, so identical
/// content classifies identically wherever it appears.
fn classify(table: &LogicalTable) -> String {
    match table.area_name.as_deref().map(str::trim) {
        Some(area) if !area.is_empty() => format!("{area} Checklist"),
        _ => DEFAULT_TABLE_NAME.to_string(),
    }
}

/// Canonical JSON array-of-arrays: header row first, then data rows in
/// merge order. JSON string escaping makes the embedding round-trip —
/// decoding reproduces the exact cell matrix.
fn serialize_cells(table: &LogicalTable) -> String {
    serde_json::to_string(&table.cell_matrix())
        .unwrap_or_else(|e| unreachable!("string matrix serialization cannot fail: {e}"))
}

/// `BMR_B<batch>_P<pages>_<digest>` — the digest is the first 8 bytes of
/// SHA-256 over the hash inputs, hex, uppercase. Every page of the unit
/// feeds the digest as a fixed-width word, so interior pages of a group
/// participate even though the display prefix only shows first-last.
fn record_hash(batch_no: i64, source_pages: &PageUnit, table_data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(batch_no.to_be_bytes());
    hasher.update([0u8]);
    for &page in source_pages.pages() {
        hasher.update(page.to_be_bytes());
    }
    hasher.update([0u8]);
    hasher.update(table_data.as_bytes());
    let digest = hasher.finalize();
    format!(
        "BMR_B{batch_no}_P{}_{}",
        source_pages.page_ref(),
        hex::encode_upper(&digest[..8])
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagespec::PageUnit;
    use crate::table::{NormalizedRow, EXPECTED_HEADER};

    fn table(rows: &[(&str, &str, &str)], pages: PageUnit, area: Option<&str>) -> LogicalTable {
        LogicalTable {
            rows: rows
                .iter()
                .map(|(n, i, d)| NormalizedRow {
                    equipment_name: n.to_string(),
                    id_number: i.to_string(),
                    due_date: d.to_string(),
                })
                .collect(),
            source_pages: pages,
            area_name: area.map(String::from),
        }
    }

    #[test]
    fn classification_uses_area_banner() {
        let t = table(&[], PageUnit::Single(10), Some("Dispensing Area"));
        assert_eq!(classify(&t), "Dispensing Area Checklist");
    }

    #[test]
    fn classification_falls_back_without_area() {
        let t = table(&[], PageUnit::Single(10), None);
        assert_eq!(classify(&t), "Equipment Calibration Table");
        let blank = table(&[], PageUnit::Single(10), Some("  "));
        assert_eq!(classify(&blank), "Equipment Calibration Table");
    }

    #[test]
    fn classification_ignores_page_numbers() {
        let a = table(&[("X", "1", "2")], PageUnit::Single(10), Some("Compression Area"));
        let b = table(&[("X", "1", "2")], PageUnit::Single(99), Some("Compression Area"));
        assert_eq!(classify(&a), classify(&b));
    }

    #[test]
    fn serialized_data_round_trips() {
        let t = table(
            &[("RMG - Ammeter", "AM-234", "27/01/25"), ("Probe \"A\"", "N/A", "N/A")],
            PageUnit::Group(vec![160, 161]),
            None,
        );
        let json = serialize_cells(&t);
        let decoded: Vec<Vec<String>> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded[0], EXPECTED_HEADER.to_vec());
        assert_eq!(decoded[1], vec!["RMG - Ammeter", "AM-234", "27/01/25"]);
        assert_eq!(decoded[2], vec!["Probe \"A\"", "N/A", "N/A"]);
    }

    #[test]
    fn hash_is_deterministic() {
        let t = table(&[("Ammeter", "AM-234", "27/01/25")], PageUnit::Single(10), None);
        let a = build_record(&t, 46, 1);
        let b = build_record(&t, 46, 1);
        assert_eq!(a.hash, b.hash);
        assert!(a.hash.starts_with("BMR_B1_P10_"));
    }

    #[test]
    fn hash_changes_with_content_batch_and_pages() {
        let base = table(&[("Ammeter", "AM-234", "27/01/25")], PageUnit::Single(10), None);
        let edited = table(&[("Ammeter", "AM-235", "27/01/25")], PageUnit::Single(10), None);
        let moved = table(&[("Ammeter", "AM-234", "27/01/25")], PageUnit::Single(11), None);

        let h = |t: &LogicalTable, batch: i64| build_record(t, 46, batch).hash;
        assert_ne!(h(&base, 1), h(&edited, 1));
        assert_ne!(h(&base, 1), h(&moved, 1));
        assert_ne!(h(&base, 1), h(&base, 2));
    }

    #[test]
    fn hash_distinguishes_groups_sharing_first_and_last_pages() {
        let rows: &[(&str, &str, &str)] = &[("Ammeter", "AM-234", "27/01/25")];
        let a = table(rows, PageUnit::Group(vec![348, 349, 350]), None);
        let b = table(rows, PageUnit::Group(vec![348, 400, 350]), None);

        let ra = build_record(&a, 46, 1);
        let rb = build_record(&b, 46, 1);
        // Same display prefix, different page membership, different hash.
        assert!(ra.hash.starts_with("BMR_B1_P348-350_"));
        assert!(rb.hash.starts_with("BMR_B1_P348-350_"));
        assert_ne!(ra.hash, rb.hash);
    }

    #[test]
    fn hash_changes_with_row_order() {
        let ab = table(
            &[("A", "1", "x"), ("B", "2", "y")],
            PageUnit::Group(vec![160, 161]),
            None,
        );
        let ba = table(
            &[("B", "2", "y"), ("A", "1", "x")],
            PageUnit::Group(vec![160, 161]),
            None,
        );
        assert_ne!(build_record(&ab, 46, 1).hash, build_record(&ba, 46, 1).hash);
    }

    #[test]
    fn created_on_does_not_affect_hash() {
        let t = table(&[("Ammeter", "AM-234", "27/01/25")], PageUnit::Single(10), None);
        let a = build_record(&t, 46, 1);
        let b = build_record(&t, 46, 1);
        // Timestamps may differ between the two builds; the hash must not.
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.created_on.len(), "2026-08-06 10:15:00".len());
    }

    #[test]
    fn fixed_literals_are_set() {
        let t = table(&[("Ammeter", "AM-234", "27/01/25")], PageUnit::Single(10), None);
        let record = build_record(&t, 46, 1);
        assert_eq!(record.step_name, "Equipment-Calibration-Check");
        assert_eq!(record.data_source, "BMR-PDF-Scan");
        assert_eq!(record.table_type, "Checklist");
        assert!(!record.is_deleted);
    }
}
