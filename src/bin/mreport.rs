//! CLI binary for manoeuvre-report.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RenderConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use manoeuvre_report::{
    export_json, generate_report, load_report, render_context, validate_report, DocumentHandle,
    FileStore, JsonContextEngine, LocalFileStore, ProgressCallback, RenderConfig,
    RenderProgressCallback, ReportSummary, SizeRules,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the whole pass plus a log line
/// per image. Images finish out of order, so timings are keyed by path.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:36.green/238}] {pos:>3}/{len} images  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Images");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, path: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(path))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.2}s", ms as f64 / 1000.0))
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
    }

    fn on_image_start(&self, path: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(path.to_string(), Instant::now());
        }
        self.bar.set_message(path.to_string());
    }

    fn on_image_complete(&self, path: &str, width_mm: f64, height_mm: f64) {
        let elapsed = self.elapsed(path);
        self.bar.println(format!(
            "  {} {:<40} {}  {}",
            green("✓"),
            path,
            dim(&format!("{width_mm:>6.1} × {height_mm:<6.1} mm")),
            elapsed
        ));
        self.bar.inc(1);
    }

    fn on_image_missing(&self, path: &str) {
        let elapsed = self.elapsed(path);
        self.bar.println(format!(
            "  {} {:<40} {}  {}",
            yellow("?"),
            path,
            dim("not found, kept as text"),
            elapsed
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, path: &str, error: &str) {
        let elapsed = self.elapsed(path);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<40} {}  {}",
            red("✗"),
            path,
            red(error),
            elapsed
        ));
        self.bar.inc(1);
    }

    fn on_render_complete(&self, total_images: usize, embedded: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} images embedded{}",
            if failed == 0 { green("✔") } else { yellow("⚠") },
            bold(&embedded.to_string()),
            total_images,
            if failed == 0 {
                String::new()
            } else {
                format!("  ({} unavailable)", red(&failed.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview the render context (images as descriptors) on stdout
  mreport rapport.json

  # Check required fields only
  mreport --validate-only rapport.json

  # Key figures of the report
  mreport --summary rapport.json

  # Export the annotated report JSON
  mreport rapport.json --export-json exports/rapport.json

  # Generate into exports/ with uploads resolved against the app directory
  mreport rapport.json --template templates/report_template.docx --base-dir /srv/app

  # Custom size rules
  mreport rapport.json --rules sizes.json

RULES FILE:
  {"rules": [{"keyword": "client_logo", "max_width_mm": 25, "max_height_mm": 25}, ...],
   "fallback": {"max_width_mm": 120, "max_height_mm": 90}}
  Rules are matched in order; the first keyword contained in the key wins.

ENVIRONMENT VARIABLES:
  RUST_LOG                 Override log filter (e.g. manoeuvre_report=debug)
  MREPORT_TEMPLATE         Template path
  MREPORT_OUTPUT_DIR       Output directory (default: exports)
  MREPORT_BASE_DIR         Directory relative upload paths resolve against
"#;

/// Prepare manoeuvrability study reports for document templating.
#[derive(Parser, Debug)]
#[command(
    name = "mreport",
    version,
    about = "Prepare manoeuvrability study reports for document templating",
    long_about = "Reads a manoeuvrability report JSON, normalises dates and metrics, embeds every \
uploaded picture at a size chosen from the key it sits under, and renders the result.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Report JSON file.
    report: PathBuf,

    /// Generate a document from this template.
    #[arg(short, long, env = "MREPORT_TEMPLATE")]
    template: Option<PathBuf>,

    /// Directory generated documents are written to.
    #[arg(short, long, env = "MREPORT_OUTPUT_DIR", default_value = "exports")]
    output_dir: PathBuf,

    /// Write the annotated report JSON to this path and stop.
    #[arg(long, env = "MREPORT_EXPORT_JSON")]
    export_json: Option<PathBuf>,

    /// Print missing required fields and stop. Exits non-zero when any.
    #[arg(long)]
    validate_only: bool,

    /// Print the report summary and stop.
    #[arg(long)]
    summary: bool,

    /// Include image bytes as data URIs in JSON output.
    #[arg(long, env = "MREPORT_EMBED_IMAGES")]
    embed_images: bool,

    /// Directory relative upload paths resolve against.
    #[arg(long, env = "MREPORT_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// JSON file with an ordered size-rule table.
    #[arg(long, env = "MREPORT_RULES")]
    rules: Option<PathBuf>,

    /// Resolution assumed for source images.
    #[arg(long, env = "MREPORT_DPI", default_value_t = 96.0)]
    dpi: f64,

    /// Number of images read concurrently.
    #[arg(short, long, env = "MREPORT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-image read timeout in seconds.
    #[arg(long, env = "MREPORT_READ_TIMEOUT", default_value_t = 10)]
    read_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "MREPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MREPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MREPORT_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Built by hand so exit does not wait on reads abandoned after a timeout.
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = rt.block_on(run(cli));
    rt.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is shown.
    let rendering = !cli.validate_only && !cli.summary && cli.export_json.is_none();
    let show_progress = rendering && !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let report = load_report(&cli.report)
        .await
        .context("Failed to load report")?;

    // ── Validate-only mode ───────────────────────────────────────────────
    if cli.validate_only {
        let issues = validate_report(&report);
        if issues.is_empty() {
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), bold("Report is complete"));
            }
            return Ok(());
        }
        for issue in &issues {
            eprintln!("  {} {}", red("✗"), issue);
        }
        anyhow::bail!("{} required field(s) missing", issues.len());
    }

    let config = build_config(&cli, show_progress).await?;

    // ── Summary mode ─────────────────────────────────────────────────────
    if cli.summary {
        let s = ReportSummary::from_report(&report, &config);
        println!("Titre:        {}", s.titre);
        println!("Client:       {}", s.client);
        println!("Projet:       {}", s.projet);
        println!("Navires:      {}", s.nb_navires);
        println!("Remorqueurs:  {}", s.nb_remorqueurs);
        println!("Simulations:  {}", s.nb_simulations);
        println!("Réussite:     {:.1}%", s.taux_reussite * 100.0);
        return Ok(());
    }

    // ── JSON export ──────────────────────────────────────────────────────
    if let Some(ref path) = cli.export_json {
        export_json(&report, path).context("JSON export failed")?;
        if !cli.quiet {
            eprintln!("{} exported  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        return Ok(());
    }

    let store: Arc<dyn FileStore> = match cli.base_dir {
        Some(ref dir) => Arc::new(LocalFileStore::with_base_dir(dir)),
        None => Arc::new(LocalFileStore::new()),
    };
    let encoding = config.image_encoding();

    // ── Generate ─────────────────────────────────────────────────────────
    if let Some(ref template) = cli.template {
        let issues = validate_report(&report);
        if !issues.is_empty() && !cli.quiet {
            eprintln!(
                "{} {} required field(s) missing; generating anyway",
                yellow("⚠"),
                issues.len()
            );
        }

        let engine = JsonContextEngine::from_config(&config);
        let generated = generate_report(&report, template, &engine, store, &config)
            .await
            .context("Report generation failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} images  {}ms  →  {}",
                if generated.stats.images_failed == 0 {
                    green("✔")
                } else {
                    yellow("⚠")
                },
                generated.stats.images_embedded,
                generated.stats.images_found,
                generated.stats.duration_ms,
                bold(&generated.path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Preview ──────────────────────────────────────────────────────────
    let document = DocumentHandle::open(&cli.report);
    let output = render_context(&report, &document, store, &config).await;
    let json = serde_json::to_string_pretty(&output.context.to_json(encoding))
        .context("Failed to serialise context")?;
    println!("{json}");

    if !cli.quiet && !show_progress {
        eprintln!(
            "{} images: {} embedded, {} missing, {} unavailable",
            output.stats.images_found,
            output.stats.images_embedded,
            output.stats.images_missing,
            output.stats.images_failed
        );
    }

    Ok(())
}

/// Map CLI args to `RenderConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .source_dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .read_timeout_secs(cli.read_timeout)
        .output_dir(cli.output_dir.clone())
        .embed_image_data(cli.embed_images);

    if let Some(ref path) = cli.rules {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read size rules from {:?}", path))?;
        let rules: SizeRules = serde_json::from_str(&text)
            .with_context(|| format!("Invalid size rules in {:?}", path))?;
        builder = builder.size_rules(rules);
    }

    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
