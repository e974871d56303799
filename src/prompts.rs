//! Extraction prompt for vision-based table recognition.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing extraction behaviour (e.g.
//!    adding a parent heading or tweaking the missing-value rule) requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the prompt directly without
//!    spinning up a real vision model, making prompt regressions easy to
//!    catch.
//!
//! Callers can override it via
//! [`crate::config::ExtractionConfigBuilder::extraction_prompt`]; the
//! constant here is used only when no override is provided.

/// Default extraction prompt sent with every page image.
///
/// The reply contract (a bare JSON object with `area_name` and
/// `table_data`) is what [`crate::pipeline::recognize::parse_model_reply`]
/// expects.
pub const EXTRACTION_PROMPT: &str = r#"You are extracting tabular data from scanned pharmaceutical BMR / GMP documents.

Extraction rules (STRICT):

1. First, identify the area/checklist name from the header "Line Clearance Checklist - [Area Name]"
   - Extract only the area name (e.g., "Dispensing Area", "Secondary Packing Area", "Compression Area")

2. Start extraction only when the table header appears:
   Equipment Name/ Instrument name | ID no. | Due date of Calibration
   Ignore any content before this header.

3. Ignore page breaks, footers, headers, document metadata, "TRUE COPY", signatures, and stamps.

4. Output a JSON object with this structure:
   {
     "area_name": "extracted area name from header",
     "table_data": [array of arrays with equipment data]
   }

5. Table data must be an array of arrays:
   - First row must be the header exactly as shown.
   - Each following row must contain exactly 3 values.

6. If an equipment has multiple IDs or dates, create one row per ID.

7. Keep parent headings such as CVC, RMG, FBD, Blister packing, RLAF as their own rows
   exactly as written; do not attach them to other rows.

8. Preserve handwritten values exactly as written.

9. If ID or Due Date is missing, crossed out, or written as NA, use "N/A".

10. Do not rename equipment.

11. If no such table exists on the page, return {"area_name": null, "table_data": []}.

12. Do not explain your reasoning. Do not wrap the reply in markdown fences.
    Return ONLY the JSON object."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_pins_the_reply_contract() {
        assert!(EXTRACTION_PROMPT.contains("\"area_name\""));
        assert!(EXTRACTION_PROMPT.contains("\"table_data\""));
        assert!(EXTRACTION_PROMPT.contains("Equipment Name/ Instrument name"));
        assert!(EXTRACTION_PROMPT.contains("exactly 3 values"));
    }
}
