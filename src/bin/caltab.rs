//! CLI binary for caltab-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints results. Two modes:
//!
//! * **Single file** — `caltab scan.pdf --pages "10,(160,161)"` writes
//!   `scan.sql` next to the input.
//! * **Content folder** — `caltab ./content` pairs every `<name>.pdf` with
//!   its sidecar `<name>.txt` page spec and writes `<name>.sql` into the
//!   output folder, skipping PDFs without a sidecar.

use anyhow::{bail, Context, Result};
use caltab_extract::{
    process_batch, spec_from_sidecar_text, write_sql_to_file, BatchOutput, BatchProgress,
    ExtractionConfig, PageUnit,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "caltab",
    version,
    about = "Extract equipment-calibration tables from scanned BMR/GMP PDFs into SQL inserts"
)]
struct Cli {
    /// PDF file, or a content folder of PDFs with sidecar .txt page specs
    input: PathBuf,

    /// Page spec for single-file mode, e.g. "10,(160,161),345"
    #[arg(short, long)]
    pages: Option<String>,

    /// Output SQL file (single-file mode). Default: input path with .sql
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output folder for folder mode
    #[arg(long, default_value = "outputsql")]
    output_dir: PathBuf,

    /// Experiment identifier written into every record
    #[arg(long, default_value_t = 46, env = "CALTAB_EXP_ID")]
    exp_id: i64,

    /// Batch number written into every record (participates in hashes)
    #[arg(long, default_value_t = 1, env = "CALTAB_BATCH_NO")]
    batch_no: i64,

    /// Rendering DPI (72–400)
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Vision model, e.g. "gemini-2.5-flash-lite", "gpt-4.1-mini"
    #[arg(short, long, env = "CALTAB_MODEL")]
    model: Option<String>,

    /// Provider name: gemini, openai, anthropic, … (auto-detected if unset)
    #[arg(long, env = "CALTAB_PROVIDER")]
    provider: Option<String>,

    /// PDF password for encrypted documents
    #[arg(long)]
    password: Option<String>,

    /// Retries per page on transient recognition failures
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-recognition-call timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Terminal progress callback: one bar over page units, a printed line per
/// completed or skipped unit.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos}/{len} units  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgress for CliProgress {
    fn on_batch_start(&self, total_units: usize) {
        self.bar.set_length(total_units as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_units} page units…"))
        ));
    }

    fn on_unit_start(&self, _index: usize, _total: usize, unit: &PageUnit) {
        self.bar.set_message(format!("pages {}", unit.page_ref()));
    }

    fn on_unit_complete(&self, _index: usize, _total: usize, unit: &PageUnit, rows: usize) {
        self.bar.println(format!(
            "  {} Pages {:<9} {}",
            green("✓"),
            unit.page_ref(),
            dim(&format!("{rows} rows"))
        ));
        self.bar.inc(1);
    }

    fn on_unit_skipped(&self, _index: usize, _total: usize, unit: &PageUnit, reason: &str) {
        let msg = if reason.len() > 80 {
            format!("{}…", &reason[..79])
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Pages {:<9} {}",
            red("✗"),
            unit.page_ref(),
            dim(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _built: usize) {
        self.bar.finish_and_clear();
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;

    if cli.input.is_dir() {
        run_folder(&cli, &config).await
    } else {
        run_single(&cli, &config).await
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "caltab_extract=warn",
        1 => "caltab_extract=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.timeout);
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.as_str());
    }
    Ok(builder.build()?)
}

/// Attach a fresh progress bar for one batch run, unless --quiet.
fn with_progress(config: &ExtractionConfig, quiet: bool) -> ExtractionConfig {
    let mut config = config.clone();
    if !quiet {
        config.progress_callback = Some(CliProgress::new());
    }
    config
}

async fn run_single(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let Some(ref pages) = cli.pages else {
        bail!(
            "--pages is required for a single PDF \
             (or pass a content folder with sidecar .txt files)"
        );
    };

    let config = with_progress(config, cli.quiet);
    let output = process_batch(&cli.input, pages, cli.exp_id, cli.batch_no, &config)
        .await
        .with_context(|| format!("processing {}", cli.input.display()))?;

    print_summary(&cli.input, &output);

    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("sql"));
    if output.records.is_empty() {
        println!("{}", yellow("⚠ No records extracted; no SQL written"));
    } else {
        write_sql_to_file(&output, &out_path).await?;
        println!("{} Saved to: {}", green("✓"), bold(&out_path.display().to_string()));
    }
    Ok(())
}

async fn run_folder(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(&cli.input)
        .with_context(|| format!("reading folder {}", cli.input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        bail!("no PDF files found in {}", cli.input.display());
    }
    println!(
        "{} {}",
        cyan("◆"),
        bold(&format!("Found {} PDF file(s) to process", pdfs.len()))
    );

    let mut processed = 0usize;
    let mut failed = 0usize;

    for pdf in &pdfs {
        let sidecar = pdf.with_extension("txt");
        let stem = pdf.file_stem().unwrap_or_default().to_string_lossy();
        if !sidecar.exists() {
            println!(
                "{} Skipping {stem}.pdf — no corresponding .txt file found",
                yellow("⚠")
            );
            continue;
        }

        let spec_text = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("reading {}", sidecar.display()))?;
        let spec = spec_from_sidecar_text(&spec_text);

        println!("\n{} {}", cyan("▶"), bold(&format!("{stem}.pdf  pages: {spec}")));

        let config = with_progress(config, cli.quiet);
        match process_batch(pdf, &spec, cli.exp_id, cli.batch_no, &config).await {
            Ok(output) => {
                print_summary(pdf, &output);
                if output.records.is_empty() {
                    println!("{}", yellow("⚠ No records extracted; no SQL written"));
                } else {
                    let out_path = cli.output_dir.join(format!("{stem}.sql"));
                    write_sql_to_file(&output, &out_path).await?;
                    println!(
                        "{} Saved to: {}",
                        green("✓"),
                        bold(&out_path.display().to_string())
                    );
                }
                processed += 1;
            }
            Err(e) => {
                println!("{} {stem}.pdf failed: {e}", red("✗"));
                failed += 1;
            }
        }
    }

    println!(
        "\n{} {}",
        green("✓"),
        bold(&format!(
            "Batch processing complete: {processed} processed, {failed} failed"
        ))
    );
    if failed > 0 {
        bail!("{failed} PDF(s) failed");
    }
    Ok(())
}

fn print_summary(input: &Path, output: &BatchOutput) {
    let s = &output.stats;
    println!(
        "{} {}: {} records, {} skipped  {}",
        green("✓"),
        input.file_name().unwrap_or_default().to_string_lossy(),
        s.records_built,
        s.units_skipped,
        dim(&format!(
            "{} pages, {} rows ({} dropped), {:.1}s",
            s.pages_rendered,
            s.rows_emitted,
            s.rows_dropped,
            s.total_duration_ms as f64 / 1000.0
        ))
    );
    for skip in &output.skips {
        println!("    {} {}: {}", red("·"), skip.unit, skip.error);
    }
}
