//! Merge: combine the normalized fragments of one page unit into a single
//! logical table.
//!
//! Fragments arrive in the unit's declared page order and the merge is a
//! plain ordered concatenation — row order is a correctness property, since
//! the scanned table reads top-to-bottom across the page break. Equipment
//! rows are never deduplicated: two rows with the same name may legitimately
//! be two instruments. Header echoes were already removed during
//! normalization, so the header exists exactly once, implicitly at position
//! zero of the serialized table.

use crate::pagespec::PageUnit;
use crate::table::{LogicalTable, NormalizedRow};

/// One page's contribution to a logical table.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub page: u32,
    pub rows: Vec<NormalizedRow>,
}

/// Concatenate fragments in declared page order into one [`LogicalTable`].
///
/// `fragments` must already be ordered by the unit's page order; the merge
/// preserves it and the in-fragment row order verbatim. An all-empty
/// fragment list yields a table with no rows — the orchestrator reports
/// that unit as empty rather than building a record for it.
pub fn merge_fragments(
    source_pages: PageUnit,
    area_name: Option<String>,
    fragments: Vec<Fragment>,
) -> LogicalTable {
    let rows = fragments
        .into_iter()
        .flat_map(|fragment| fragment.rows)
        .collect();

    LogicalTable {
        rows,
        source_pages,
        area_name,
    }
}
