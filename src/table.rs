//! Table data model: what the recognizer returns and what the pipeline
//! produces from it.
//!
//! Every stage owns its output until it hands it to the next stage —
//! [`RawTable`] fragments belong to exactly one page unit and are consumed
//! by the merge for that unit, never referenced again.

use crate::pagespec::PageUnit;
use serde::{Deserialize, Serialize};

/// The fixed calibration-table header. Tables whose recognized header does
/// not match this (case/whitespace-insensitive) are some other table on the
/// page and are rejected with a header mismatch.
pub const EXPECTED_HEADER: [&str; 3] = [
    "Equipment Name/ Instrument name",
    "ID no.",
    "Due date of Calibration",
];

/// Sentinel written for cells that are blank, struck through, or otherwise
/// unreadable. A genuinely scanned literal "N/A" collapses to the same
/// sentinel — an accepted lossy simplification.
pub const MISSING: &str = "N/A";

/// A table as returned by the recognition boundary for one page: a header
/// row and zero or more data rows of cell strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One normalized equipment row. No field is ever blank: unreadable ID/date
/// cells become [`MISSING`], and a row with an unreadable equipment name is
/// dropped before this type is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Equipment name, possibly `Parent - Child` prefixed.
    pub equipment_name: String,
    pub id_number: String,
    pub due_date: String,
}

impl NormalizedRow {
    /// The row as a cell triple, in header column order.
    pub fn cells(&self) -> [&str; 3] {
        [&self.equipment_name, &self.id_number, &self.due_date]
    }
}

/// The merged, normalized table for one page unit. The header appears
/// exactly once regardless of how many page fragments contributed rows;
/// row order is fragment arrival order (page order, then in-page order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalTable {
    pub rows: Vec<NormalizedRow>,
    pub source_pages: PageUnit,
    /// Checklist area banner read off the first contributing page, when the
    /// recognizer found one (`Line Clearance Checklist - <Area>`).
    pub area_name: Option<String>,
}

impl LogicalTable {
    /// Header + data rows as an array of cell arrays, the canonical form
    /// serialized into records.
    pub fn cell_matrix(&self) -> Vec<Vec<&str>> {
        let mut matrix = Vec::with_capacity(self.rows.len() + 1);
        matrix.push(EXPECTED_HEADER.to_vec());
        matrix.extend(self.rows.iter().map(|r| r.cells().to_vec()));
        matrix
    }
}

/// Canonical form of a cell for comparison: lowercase, whitespace collapsed.
pub(crate) fn canon(cell: &str) -> String {
    cell.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case/whitespace-insensitive match against [`EXPECTED_HEADER`].
pub fn header_matches(cells: &[String]) -> bool {
    cells.len() == EXPECTED_HEADER.len()
        && cells
            .iter()
            .zip(EXPECTED_HEADER)
            .all(|(got, want)| canon(got) == canon(want))
}
