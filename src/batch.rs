//! Batch orchestration: drive every page unit through render → recognize →
//! normalize → merge → record.
//!
//! ## Why strictly sequential?
//!
//! Units are processed one at a time, in spec order. Two reasons:
//!
//! * The recognition boundary is rate-limited; firing pages concurrently
//!   just converts quota into 429 retries.
//! * The active-parent accumulator threads through a unit's page fragments
//!   in order; concurrent units would need that state fenced per unit
//!   anyway, and nothing here is CPU-bound enough to justify it.
//!
//! ## Failure isolation
//!
//! A failing unit never aborts the batch. Render and recognition failures
//! retry with exponential backoff (a rate-limit reply with a
//! server-specified delay overrides the computed backoff), then the unit is
//! recorded as skipped and processing continues. Only two things are fatal:
//! a page spec that cannot be parsed or validated, and an input document
//! that cannot be opened — in both cases there is nothing to even start.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, UnitError};
use crate::output::{BatchOutput, BatchStats, SkipReason};
use crate::pagespec::{parse_page_spec, PageUnit};
use crate::pipeline::merge::{merge_fragments, Fragment};
use crate::pipeline::normalize::{normalize_fragment, NormalizedFragment};
use crate::pipeline::recognize::{
    Recognition, RecognizeError, TableRecognizer, VisionTableRecognizer,
};
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::{input, record};
use crate::table::LogicalTable;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Process one PDF's page spec into records plus skip reasons.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `pdf_path`      — Local path to the scanned PDF
/// * `page_spec`     — Page list, e.g. `"10,(160,161),345"`
/// * `experiment_id` — Caller-supplied experiment identifier
/// * `batch_no`      — Caller-supplied batch number (participates in record
///   hashes)
/// * `config`        — Extraction configuration
///
/// # Returns
/// `Ok(BatchOutput)` whenever the batch ran, even if every unit was skipped
/// (check `output.skips`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors: a malformed page
/// spec, a page beyond the document, or an input file that cannot be
/// opened.
pub async fn process_batch(
    pdf_path: impl AsRef<Path>,
    page_spec: &str,
    experiment_id: i64,
    batch_no: i64,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    let total_start = Instant::now();
    let pdf_path = pdf_path.as_ref();
    info!("Starting batch: {} pages '{}'", pdf_path.display(), page_spec);

    // ── Step 1: Parse the page spec ──────────────────────────────────────
    let units = parse_page_spec(page_spec)?;
    debug!("Parsed {} page units", units.len());

    // ── Step 2: Resolve boundaries ───────────────────────────────────────
    let renderer = resolve_renderer(pdf_path, config).await?;
    let recognizer = resolve_recognizer(config)?;

    // ── Step 3: Validate pages against the document ──────────────────────
    let total_pages = renderer.page_count();
    for unit in &units {
        for &page in unit.pages() {
            if page as usize > total_pages {
                return Err(ExtractError::PageOutOfRange {
                    page,
                    total: total_pages,
                });
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(units.len());
    }

    // ── Step 4: Process units strictly in spec order ─────────────────────
    let mut records = Vec::new();
    let mut skips = Vec::new();
    let mut stats = BatchStats {
        units_total: units.len(),
        ..BatchStats::default()
    };

    for (i, unit) in units.iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_unit_start(index, units.len(), unit);
        }

        match process_unit(unit, renderer.as_ref(), recognizer.as_ref(), config, &mut stats).await
        {
            Ok(table) => {
                stats.rows_emitted += table.rows.len();
                let record = record::build_record(&table, experiment_id, batch_no);
                info!(
                    "Unit {} ({}): {} rows → {}",
                    index,
                    unit.page_ref(),
                    table.rows.len(),
                    record.hash
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_unit_complete(index, units.len(), unit, table.rows.len());
                }
                records.push(record);
            }
            Err(error) => {
                warn!("Unit {} ({}) skipped: {}", index, unit.page_ref(), error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_unit_skipped(index, units.len(), unit, &error.to_string());
                }
                skips.push(SkipReason {
                    unit: unit.clone(),
                    error,
                });
            }
        }
    }

    stats.records_built = records.len();
    stats.units_skipped = skips.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {}/{} units, {}ms total",
        stats.records_built, stats.units_total, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(stats.units_total, stats.records_built);
    }

    Ok(BatchOutput {
        records,
        skips,
        stats,
    })
}

/// Synchronous wrapper around [`process_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_batch_sync(
    pdf_path: impl AsRef<Path>,
    page_spec: &str,
    experiment_id: i64,
    batch_no: i64,
    config: &ExtractionConfig,
) -> Result<BatchOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_batch(
            pdf_path,
            page_spec,
            experiment_id,
            batch_no,
            config,
        ))
}

/// Write the batch's SQL script to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_sql_to_file(
    output: &BatchOutput,
    path: impl AsRef<Path>,
) -> Result<(), ExtractError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("sql.tmp");
    let script = format!("{}\n", output.sql_script());
    tokio::fs::write(&tmp_path, &script)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run one page unit to a logical table, or a reason it produced none.
///
/// The active parent threads across the unit's fragments (a parent declared
/// on page 160 still governs rows on page 161 of the same group) and dies
/// with the unit. A render or recognition failure on any page fails the
/// whole unit — a partial multi-page table would silently lose rows. A
/// clean "no table on this page" is just an empty fragment.
async fn process_unit(
    unit: &PageUnit,
    renderer: &dyn PageRenderer,
    recognizer: &dyn TableRecognizer,
    config: &ExtractionConfig,
    stats: &mut BatchStats,
) -> Result<LogicalTable, UnitError> {
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut active_parent: Option<String> = None;
    let mut area_name: Option<String> = None;

    for &page in unit.pages() {
        let render_start = Instant::now();
        let image = renderer
            .render_page(page)
            .await
            .map_err(|e| UnitError::RenderFailed {
                page,
                detail: e.detail,
            })?;
        let encoded = encode_scan(page, &image)?;
        stats.pages_rendered += 1;
        stats.render_duration_ms += render_start.elapsed().as_millis() as u64;

        let recognize_start = Instant::now();
        let outcome = recognize_with_retry(recognizer, page, &encoded, config).await;
        stats.recognition_duration_ms += recognize_start.elapsed().as_millis() as u64;
        let outcome = outcome?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_recognized(page);
        }

        match outcome {
            Recognition::NoTable => {
                debug!("Page {}: no calibration table", page);
            }
            Recognition::Table(recognized) => {
                let NormalizedFragment {
                    rows,
                    active_parent: next_parent,
                    rows_dropped,
                } = normalize_fragment(&recognized.table, active_parent)
                    .map_err(|m| UnitError::HeaderMismatch {
                        page,
                        found: m.found,
                    })?;
                active_parent = next_parent;
                stats.rows_dropped += rows_dropped;
                if area_name.is_none() {
                    area_name = recognized.area_name;
                }
                fragments.push(Fragment { page, rows });
            }
        }
    }

    if fragments.is_empty() {
        return Err(UnitError::NoTableFound);
    }

    let table = merge_fragments(unit.clone(), area_name, fragments);
    if table.rows.is_empty() {
        return Err(UnitError::NoUsableRows);
    }
    Ok(table)
}

/// Wrap a rendered scan page as a base64 PNG attachment for recognition.
///
/// PNG, never JPEG: compression artefacts around handwritten IDs and due
/// dates measurably degrade cell transcription on 300-DPI scans. `detail:
/// "high"` keeps the full image tile budget so small table cells stay
/// readable. An encoding failure counts against the page's render, since
/// the unit cannot proceed without the image either way.
fn encode_scan(page: u32, image: &DynamicImage) -> Result<ImageData, UnitError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| UnitError::RenderFailed {
            page,
            detail: format!("image encoding failed: {e}"),
        })?;
    Ok(ImageData::new(STANDARD.encode(&png), "image/png").with_detail("high"))
}

/// One recognition attempt outcome we might retry past.
enum AttemptFailure {
    Timeout,
    Recognize(RecognizeError),
}

/// Call the recognizer with timeout, bounded retries, and backoff.
///
/// The backoff doubles per attempt (500 ms → 1 s → 2 s by default); a
/// rate-limit reply carrying `retry_after_secs` overrides the computed
/// delay for the following attempt. Dropping the timed-out future cancels
/// the in-flight request.
async fn recognize_with_retry(
    recognizer: &dyn TableRecognizer,
    page: u32,
    image: &ImageData,
    config: &ExtractionConfig,
) -> Result<Recognition, UnitError> {
    let mut last_failure: Option<AttemptFailure> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = match &last_failure {
                Some(AttemptFailure::Recognize(RecognizeError::RateLimited {
                    retry_after_secs: Some(secs),
                })) => Duration::from_secs(*secs),
                _ => Duration::from_millis(config.retry_backoff_ms * 2u64.pow(attempt - 1)),
            };
            warn!(
                "Page {}: retry {}/{} after {:?}",
                page, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        let call = recognizer.recognize_page(page, image);
        match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Ok(Ok(outcome)) => return Ok(outcome),
            Ok(Err(e)) => {
                warn!("Page {}: attempt {} failed — {}", page, attempt + 1, e);
                last_failure = Some(AttemptFailure::Recognize(e));
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    page,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_failure = Some(AttemptFailure::Timeout);
            }
        }
    }

    Err(match last_failure {
        Some(AttemptFailure::Timeout) => UnitError::Timeout {
            page,
            secs: config.api_timeout_secs,
        },
        Some(AttemptFailure::Recognize(RecognizeError::RateLimited { .. })) => {
            UnitError::RateLimited {
                page,
                retries: config.max_retries,
            }
        }
        Some(AttemptFailure::Recognize(e)) => UnitError::RecognitionFailed {
            page,
            retries: config.max_retries,
            detail: e.to_string(),
        },
        None => UnitError::RecognitionFailed {
            page,
            retries: config.max_retries,
            detail: "no attempt was made".into(),
        },
    })
}

/// Resolve the page renderer: an injected one, or pdfium over the resolved
/// input path.
async fn resolve_renderer(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<Arc<dyn PageRenderer>, ExtractError> {
    if let Some(ref renderer) = config.renderer {
        return Ok(Arc::clone(renderer));
    }
    let resolved = input::resolve_local(pdf_path)?;
    let renderer = PdfiumRenderer::open(
        &resolved,
        config.password.clone(),
        config.dpi,
        config.max_rendered_pixels,
    )
    .await?;
    Ok(Arc::new(renderer))
}

/// Resolve the table recognizer: an injected one, or a vision recognizer
/// over the resolved provider.
fn resolve_recognizer(config: &ExtractionConfig) -> Result<Arc<dyn TableRecognizer>, ExtractError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }
    let provider = resolve_provider(config)?;
    let mut recognizer = VisionTableRecognizer::new(provider)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    if let Some(ref prompt) = config.extraction_prompt {
        recognizer = recognizer.with_prompt(prompt.clone());
    }
    Ok(Arc::new(recognizer))
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the provider entirely; used as-is.
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key (`GEMINI_API_KEY`, etc.) from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
///    — the execution environment (Makefile, CI) chose for us.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gemini-2.5-flash-lite");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn encode_scan_produces_png_attachment() {
        let scan = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([255; 4])));
        let data = encode_scan(160, &scan).unwrap();
        assert_eq!(data.mime_type, "image/png");
        // The payload must decode back to a PNG stream (magic bytes).
        let bytes = STANDARD.decode(&data.data).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
