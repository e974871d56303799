//! Pipeline stages for calibration-table extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different rendering backend or vision
//! provider) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ recognize ──▶ normalize ──▶ merge ──▶ record
//! (path)    (pdfium)   (vision LLM)  (shape+parent) (unit)   (hash+SQL)
//! ```
//!
//! 1. [`input`]     — validate the user-supplied path and PDF magic bytes
//! 2. [`render`]    — rasterise one page; runs in `spawn_blocking` because
//!    pdfium is not async-safe. The orchestrator base64-wraps the rendered
//!    scan as a lossless PNG on the way into recognition.
//! 3. [`recognize`] — drive the vision call and parse the JSON reply; the
//!    only stage with network I/O
//! 4. [`normalize`] — validate table shape, coerce unreadable cells, resolve
//!    parent/child equipment names
//! 5. [`merge`]     — concatenate a unit's page fragments into one logical
//!    table in declared page order
//! 6. [`record`]    — classify, serialize canonically, and derive the
//!    record's stable identity

pub mod input;
pub mod merge;
pub mod normalize;
pub mod recognize;
pub mod record;
pub mod render;
