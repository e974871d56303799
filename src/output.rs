//! Output types: built records, skip reports, and batch statistics.

use crate::error::UnitError;
use crate::pagespec::PageUnit;
use serde::{Deserialize, Serialize};

/// Target table for emitted INSERT statements.
pub const SQL_TABLE: &str = "experimenttablerecord";

/// The persisted-record descriptor built from one logical table.
///
/// Immutable once built. `hash` is a deterministic function of
/// `(batch_no, source_pages, table_data)` — an idempotency/audit key, not a
/// security primitive. `created_on` is stamped at build time and excluded
/// from the hash input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub experiment_id: i64,
    pub batch_no: i64,
    pub step_name: String,
    pub table_name: String,
    pub data_source: String,
    /// Canonical JSON array-of-arrays: header row first, then data rows in
    /// merge order. Decoding reproduces the logical table exactly.
    pub table_data: String,
    pub created_on: String,
    pub hash: String,
    pub is_deleted: bool,
    pub table_type: String,
    pub source_pages: PageUnit,
}

impl TableRecord {
    /// Render the record as an `INSERT` statement for the target schema.
    ///
    /// Column order and literal formatting are fixed by the consuming
    /// database: integers unquoted, `investigation_method` NULL,
    /// `isDeleted` 0, text literals single-quoted with embedded quotes
    /// doubled.
    pub fn to_sql(&self) -> String {
        format!(
            "INSERT INTO {table} \n\
             (exp_id, exp_batch_no, exp_step_name, table_name, data_source, investigation_method, table_data, created_on, hash, isDeleted, table_type) \n\
             VALUES ({exp_id}, {batch_no}, '{step}', '{name}', '{source}', NULL,\n \
             '{data}',\n \
             '{created}', '{hash}', 0, '{kind}');",
            table = SQL_TABLE,
            exp_id = self.experiment_id,
            batch_no = self.batch_no,
            step = sql_quote(&self.step_name),
            name = sql_quote(&self.table_name),
            source = sql_quote(&self.data_source),
            data = sql_quote(&self.table_data),
            created = sql_quote(&self.created_on),
            hash = sql_quote(&self.hash),
            kind = sql_quote(&self.table_type),
        )
    }
}

/// Double single quotes for embedding in a SQL text literal.
fn sql_quote(text: &str) -> String {
    text.replace('\'', "''")
}

/// Why a page unit produced no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipReason {
    pub unit: PageUnit,
    pub error: UnitError,
}

/// Counters and timings for one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Page units in the parsed spec.
    pub units_total: usize,
    /// Units that yielded a record.
    pub records_built: usize,
    /// Units skipped with a reason.
    pub units_skipped: usize,
    /// Pages successfully rasterised.
    pub pages_rendered: usize,
    /// Normalized rows across all built records.
    pub rows_emitted: usize,
    /// Rows dropped as malformed or unidentifiable.
    pub rows_dropped: usize,
    /// Wall-clock duration of the whole batch.
    pub total_duration_ms: u64,
    /// Time spent rasterising pages.
    pub render_duration_ms: u64,
    /// Time spent in recognition calls (including retries and backoff).
    pub recognition_duration_ms: u64,
}

/// Complete result of a batch run: the batch always completes and reports
/// records plus skips, unless the page spec itself was unusable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Successfully built records, in spec order.
    pub records: Vec<TableRecord>,
    /// Skipped units with reasons, in spec order.
    pub skips: Vec<SkipReason>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// All records rendered as a SQL script, statements separated by a
    /// blank line.
    pub fn sql_script(&self) -> String {
        self.records
            .iter()
            .map(TableRecord::to_sql)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
