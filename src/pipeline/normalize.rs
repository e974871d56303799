//! Normalization: shape-check a recognized table and resolve parent/child
//! equipment naming.
//!
//! Scanned calibration tables group equipment under parent-category rows
//! (`CVC`, `RMG`, `FBD`, …). The parent row itself names no instrument — it
//! is a section heading inside the table — so it is suppressed and its label
//! is carried forward, prefixing every following child row as
//! `Parent - Child` until the next parent appears.
//!
//! The carried parent is explicit state threaded through the fold, handed
//! back to the caller so it can flow into the next page fragment of the same
//! logical table. It must survive a page break inside a group (a parent
//! declared on page 160 still governs rows on page 161) and must reset
//! between units.
//!
//! Missing-value policy: blank, struck-through, or otherwise unreadable
//! ID/date cells become the `"N/A"` sentinel. A literal "N/A" written on the
//! page collapses to the same sentinel; the two are not distinguishable
//! downstream. This is a known lossy simplification, kept on purpose.

use crate::table::{canon, header_matches, NormalizedRow, RawTable, MISSING};

/// Parent-category labels recognized as section headings, matched
/// case-insensitively against the equipment-name cell.
const PARENT_LABELS: [&str; 6] = [
    "CVC",
    "RMG",
    "FBD",
    "Blister packing",
    "Blister Machine",
    "RLAF",
];

/// Cell texts the recognizer uses to mark a crossed-out or unreadable value.
const STRUCK_MARKERS: [&str; 5] = ["na", "n.a.", "-", "--", "nil"];

/// Result of normalizing one page fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFragment {
    /// Usable data rows, in page order.
    pub rows: Vec<NormalizedRow>,
    /// Parent label in effect after the fragment's last row; feed into the
    /// next fragment of the same unit.
    pub active_parent: Option<String>,
    /// Rows dropped as malformed (wrong width) or unidentifiable (no name).
    pub rows_dropped: usize,
}

/// Raised when the fragment's header is not the calibration-table header.
#[derive(Debug, Clone)]
pub struct HeaderMismatch {
    pub found: Vec<String>,
}

/// Normalize one recognized fragment, threading the active parent through.
///
/// Row handling, in order:
/// 1. rows whose width ≠ 3 are dropped (partial-table tolerance);
/// 2. rows echoing the header (the recognizer repeats it on continuation
///    pages) are silently discarded before parent resolution;
/// 3. a row whose name cell is exactly a parent label sets the parent and is
///    suppressed;
/// 4. a row already in `Parent - Child` form passes through and updates the
///    parent;
/// 5. any other row inherits the active parent prefix, if one is set;
/// 6. unreadable ID/date cells coerce to `"N/A"`; an unreadable name drops
///    the row (a record with no equipment name identifies nothing).
pub fn normalize_fragment(
    raw: &RawTable,
    active_parent: Option<String>,
) -> Result<NormalizedFragment, HeaderMismatch> {
    if !header_matches(&raw.header) {
        return Err(HeaderMismatch {
            found: raw.header.clone(),
        });
    }

    let mut parent = active_parent;
    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut rows_dropped = 0usize;

    for cells in &raw.rows {
        if cells.len() != 3 {
            rows_dropped += 1;
            continue;
        }
        if header_matches(cells) {
            continue;
        }

        let name = cells[0].trim();
        if is_unreadable(name) {
            rows_dropped += 1;
            continue;
        }

        if is_parent_label(name) {
            parent = Some(name.to_string());
            continue;
        }

        let equipment_name = match parent_prefix(name) {
            Some(prefix) => {
                parent = Some(prefix.to_string());
                name.to_string()
            }
            None => match &parent {
                Some(p) => format!("{p} - {name}"),
                None => name.to_string(),
            },
        };

        rows.push(NormalizedRow {
            equipment_name,
            id_number: coerce_missing(&cells[1]),
            due_date: coerce_missing(&cells[2]),
        });
    }

    Ok(NormalizedFragment {
        rows,
        active_parent: parent,
        rows_dropped,
    })
}

/// True when the name cell is exactly a recognized parent label.
fn is_parent_label(name: &str) -> bool {
    PARENT_LABELS.iter().any(|label| canon(label) == canon(name))
}

/// If the name is already `Parent - Child` (or `P1 / P2 - Child`) with a
/// recognized parent, return the parent prefix.
fn parent_prefix(name: &str) -> Option<&str> {
    let (prefix, child) = name.split_once(" - ")?;
    if child.trim().is_empty() {
        return None;
    }
    let prefix = prefix.trim();
    prefix
        .split('/')
        .any(|part| is_parent_label(part.trim()))
        .then_some(prefix)
}

/// Replace an unreadable cell with the `"N/A"` sentinel, else pass the
/// trimmed value through.
fn coerce_missing(cell: &str) -> String {
    let cell = cell.trim();
    if is_unreadable(cell) {
        MISSING.to_string()
    } else {
        cell.to_string()
    }
}

fn is_unreadable(cell: &str) -> bool {
    if cell.is_empty() {
        return true;
    }
    let c = canon(cell);
    if c == "n/a" || STRUCK_MARKERS.contains(&c.as_str()) {
        return true;
    }
    // Strikethrough and annotations the vision model emits for cells it can
    // see but not read.
    (cell.starts_with("~~") && cell.ends_with("~~"))
        || c.contains("illegible")
        || c.contains("crossed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::EXPECTED_HEADER;

    fn raw(rows: &[&[&str]]) -> RawTable {
        RawTable {
            header: EXPECTED_HEADER.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn names(fragment: &NormalizedFragment) -> Vec<&str> {
        fragment
            .rows
            .iter()
            .map(|r| r.equipment_name.as_str())
            .collect()
    }

    #[test]
    fn rejects_foreign_header() {
        let table = RawTable {
            header: vec!["Name".into(), "Qty".into(), "Price".into()],
            rows: vec![],
        };
        let err = normalize_fragment(&table, None).unwrap_err();
        assert_eq!(err.found[1], "Qty");
    }

    #[test]
    fn parent_row_is_suppressed_and_prefixes_children() {
        let table = raw(&[
            &["RMG", "", ""],
            &["Ammeter", "AM-234", "27/01/25"],
            &["Voltmeter", "VM-102", "03/02/25"],
        ]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(names(&fragment), vec!["RMG - Ammeter", "RMG - Voltmeter"]);
        assert_eq!(fragment.rows[0].id_number, "AM-234");
        assert_eq!(fragment.active_parent.as_deref(), Some("RMG"));
    }

    #[test]
    fn parent_label_matches_case_insensitively() {
        let table = raw(&[&["blister packing", "", ""], &["Sealer", "BL-9", "01/06/25"]]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(names(&fragment), vec!["blister packing - Sealer"]);
    }

    #[test]
    fn prefixed_row_passes_through_and_updates_parent() {
        let table = raw(&[
            &["CVC - Counter Filler", "PG-286", "25/05/24"],
            &["Conveyor", "CV-11", "30/05/24"],
        ]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(
            names(&fragment),
            vec!["CVC - Counter Filler", "CVC - Conveyor"]
        );
    }

    #[test]
    fn multi_parent_prefix_is_recognized() {
        let table = raw(&[
            &["CVC / RMG - Shared Panel", "SP-1", "12/12/24"],
            &["Gauge", "GA-7", "13/12/24"],
        ]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(
            names(&fragment),
            vec!["CVC / RMG - Shared Panel", "CVC / RMG - Gauge"]
        );
    }

    #[test]
    fn hyphenated_equipment_name_is_not_a_parent_prefix() {
        let table = raw(&[&["Weighing - Balance", "WB-3", "01/01/25"]]);
        let fragment = normalize_fragment(&table, None).unwrap();
        // "Weighing" is not a recognized parent, so the name passes through
        // without becoming the active parent.
        assert_eq!(names(&fragment), vec!["Weighing - Balance"]);
        assert_eq!(fragment.active_parent, None);
    }

    #[test]
    fn active_parent_carries_in_from_previous_fragment() {
        let table = raw(&[&["Sieve", "SV-2", "19/03/25"]]);
        let fragment = normalize_fragment(&table, Some("FBD".to_string())).unwrap();
        assert_eq!(names(&fragment), vec!["FBD - Sieve"]);
        assert_eq!(fragment.active_parent.as_deref(), Some("FBD"));
    }

    #[test]
    fn missing_cells_become_sentinel_never_empty() {
        let table = raw(&[
            &["Ammeter", "", "  "],
            &["Hygrometer", "NA", "~~21/04/24~~"],
            &["Thermometer", "-", "illegible"],
        ]);
        let fragment = normalize_fragment(&table, None).unwrap();
        for row in &fragment.rows {
            assert_eq!(row.id_number, row.id_number.trim());
            assert!(!row.id_number.is_empty());
            assert!(!row.due_date.is_empty());
        }
        assert_eq!(fragment.rows[0].id_number, "N/A");
        assert_eq!(fragment.rows[0].due_date, "N/A");
        assert_eq!(fragment.rows[1].id_number, "N/A");
        assert_eq!(fragment.rows[1].due_date, "N/A");
        assert_eq!(fragment.rows[2].due_date, "N/A");
    }

    #[test]
    fn literal_na_collapses_to_sentinel() {
        let table = raw(&[&["Ammeter", "n/a", "N/A"]]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(fragment.rows[0].id_number, "N/A");
        assert_eq!(fragment.rows[0].due_date, "N/A");
    }

    #[test]
    fn nameless_row_is_dropped() {
        let table = raw(&[&["", "AM-234", "27/01/25"], &["Ammeter", "AM-235", "28/01/25"]]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(fragment.rows.len(), 1);
        assert_eq!(fragment.rows_dropped, 1);
    }

    #[test]
    fn malformed_width_rows_are_dropped_table_continues() {
        let table = RawTable {
            header: EXPECTED_HEADER.iter().map(|s| s.to_string()).collect(),
            rows: vec![
                vec!["Ammeter".into(), "AM-234".into()],
                vec!["Voltmeter".into(), "VM-1".into(), "01/01/25".into()],
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ],
        };
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(names(&fragment), vec!["Voltmeter"]);
        assert_eq!(fragment.rows_dropped, 2);
    }

    #[test]
    fn echoed_header_row_is_discarded_before_prefixing() {
        let table = raw(&[
            &["RMG", "", ""],
            &["Equipment Name/ Instrument name", "ID no.", "Due date of Calibration"],
            &["Ammeter", "AM-234", "27/01/25"],
        ]);
        let fragment = normalize_fragment(&table, None).unwrap();
        assert_eq!(names(&fragment), vec!["RMG - Ammeter"]);
    }
}
