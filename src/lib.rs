//! # caltab-extract
//!
//! Extract equipment-calibration tables from scanned pharmaceutical BMR/GMP
//! documents using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Batch records are scanned, stamped, and hand-annotated — classic table
//! extractors (lattice/stream heuristics over a text layer) get nothing
//! useful out of them. Instead this crate rasterises each listed page into
//! a PNG and lets a VLM read the calibration table as a human would, then
//! does the part a model can't be trusted with deterministically:
//! validating table shape, merging tables that continue across pages,
//! re-attaching parent-category prefixes to equipment rows, and minting
//! stable record identities for database insertion.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + page spec "10,(160,161),345"
//!  │
//!  ├─ 1. Parse      page spec → ordered page units (single page or group)
//!  ├─ 2. Render     rasterise each unit's pages via pdfium (spawn_blocking),
//!  │                wrapped as lossless base64 PNG for the vision call
//!  ├─ 3. Recognize  vision call per page, strict JSON reply, retry/backoff
//!  ├─ 4. Normalize  shape check, N/A policy, parent/child prefixing
//!  ├─ 5. Merge      concatenate a unit's fragments in declared page order
//!  └─ 6. Record     classify, serialize canonically, hash → INSERT row
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use caltab_extract::{process_batch, write_sql_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = process_batch("bmr_scan.pdf", "10,(160,161)", 46, 1, &config).await?;
//!     for skip in &output.skips {
//!         eprintln!("skipped {}: {}", skip.unit, skip.error);
//!     }
//!     write_sql_to_file(&output, "bmr_scan.sql").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `caltab` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! caltab-extract = { version = "0.3", default-features = false }
//! ```
//!
//! ## Known limitation
//!
//! A cell the scanner struck through, a blank cell, and a cell where the
//! operator genuinely wrote "N/A" all collapse to the same `"N/A"`
//! sentinel in the output. The distinction is not recoverable downstream;
//! consumers must not treat `"N/A"` as "was definitely blank".

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pagespec;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_batch, process_batch_sync, write_sql_to_file};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, UnitError};
pub use output::{BatchOutput, BatchStats, SkipReason, TableRecord};
pub use pagespec::{format_page_spec, parse_page_spec, spec_from_sidecar_text, PageUnit};
pub use pipeline::recognize::{
    Recognition, RecognizeError, RecognizedTable, TableRecognizer, VisionTableRecognizer,
};
pub use pipeline::render::{PageRenderer, PdfiumRenderer, RenderError};
pub use progress::{BatchProgress, NoopProgress, ProgressCallback};
pub use table::{LogicalTable, NormalizedRow, RawTable, EXPECTED_HEADER, MISSING};
