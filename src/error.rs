//! Error types for the caltab-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the batch cannot proceed at all
//!   (unparsable page spec, bad input file, wrong password, provider not
//!   configured). Returned as `Err(ExtractError)` from the top-level
//!   `process_batch*` functions.
//!
//! * [`UnitError`] — **Non-fatal**: a single page unit failed (header
//!   mismatch, render glitch, recognition failure after retries) but all
//!   other units are fine. Stored inside [`crate::output::SkipReason`] so
//!   callers can inspect partial success rather than losing the whole batch
//!   to one bad table.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! skipped unit, log and continue, or collect all skips for a post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the caltab-extract library.
///
/// Unit-level failures use [`UnitError`] and are stored in
/// [`crate::output::SkipReason`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Page-spec errors ──────────────────────────────────────────────────
    /// The page spec string could not be parsed. The whole batch aborts —
    /// with an unusable spec there is no unit to even start.
    #[error("Malformed page spec '{spec}': {detail}")]
    MalformedPageSpec { spec: String, detail: String },

    /// A page in the spec exceeds the document's page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: usize },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Recognizer errors ─────────────────────────────────────────────────
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output SQL file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page unit.
///
/// Stored in [`crate::output::SkipReason`] when a unit is skipped.
/// The overall batch always continues with the remaining units.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// The recognized table's header does not match the fixed 3-column
    /// calibration header; the table on this page is some other table.
    #[error("Page {page}: header mismatch, got {found:?}")]
    HeaderMismatch { page: u32, found: Vec<String> },

    /// No qualifying table was recognized on any page of the unit.
    #[error("No calibration table found")]
    NoTableFound,

    /// Fragments were recognized but every row was dropped during
    /// normalization (all malformed or unreadable).
    #[error("No usable rows after normalization")]
    NoUsableRows,

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// Recognition call failed after all retries.
    #[error("Page {page}: recognition failed after {retries} retries: {detail}")]
    RecognitionFailed {
        page: u32,
        retries: u32,
        detail: String,
    },

    /// Recognition was still rate-limited after all backoff attempts.
    #[error("Page {page}: rate-limited after {retries} attempts")]
    RateLimited { page: u32, retries: u32 },

    /// Recognition call timed out.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: u32, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_page_spec_display() {
        let e = ExtractError::MalformedPageSpec {
            spec: "10,(x)".into(),
            detail: "invalid page number 'x'".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("10,(x)"), "got: {msg}");
        assert!(msg.contains("invalid page number"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = ExtractError::PageOutOfRange {
            page: 345,
            total: 120,
        };
        assert!(e.to_string().contains("345"));
        assert!(e.to_string().contains("120 pages"));
    }

    #[test]
    fn header_mismatch_display() {
        let e = UnitError::HeaderMismatch {
            page: 160,
            found: vec!["Name".into(), "Qty".into()],
        };
        assert!(e.to_string().contains("Page 160"));
        assert!(e.to_string().contains("Qty"));
    }

    #[test]
    fn rate_limited_display() {
        let e = UnitError::RateLimited {
            page: 10,
            retries: 3,
        };
        assert!(e.to_string().contains("3 attempts"));
    }
}
