//! Render and export entry points.
//!
//! [`render_context`] is the core pass: prepare the report, collect every
//! image leaf, materialise the leaves concurrently with a per-image read
//! timeout, then walk the report once more to substitute the outcomes.
//! [`generate_report`] wraps it with a template engine and writes the
//! finished document; [`export_json`] writes the annotated report itself.

use crate::config::RenderConfig;
use crate::document::DocumentHandle;
use crate::error::{ImageError, ReportError};
use crate::pipeline::{
    collect_image_leaves, walk, ContextPreparer, DirectResolver, ImageLeaf, ImageMaterializer,
    ImageOutcome, ImageResolver, PrefetchedImages,
};
use crate::progress::ProgressCallback;
use crate::report::annotate_for_export;
use crate::store::FileStore;
use crate::template::TemplateEngine;
use crate::value::RenderContext;
use chrono::Local;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Prefix of every generated document's file name.
pub const OUTPUT_FILE_PREFIX: &str = "rapport_manoeuvrabilite";

/// Per-pass image counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Distinct `(path, key)` image leaves found in the report.
    pub images_found: usize,
    pub images_embedded: usize,
    /// Leaves whose path does not exist; left as the original string.
    pub images_missing: usize,
    /// Leaves replaced by a diagnostic.
    pub images_failed: usize,
    pub duration_ms: u64,
    pub failures: Vec<ImageError>,
}

/// A render context together with the statistics of the pass that built it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub context: RenderContext,
    pub stats: RenderStats,
}

/// A document written by [`generate_report`].
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub stats: RenderStats,
}

/// Read and parse a report JSON file.
pub async fn load_report(path: impl AsRef<Path>) -> Result<Value, ReportError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ReportError::ReportNotFound {
            path: path.to_path_buf(),
        },
        _ => ReportError::InvalidReport {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;
    serde_json::from_str(&text).map_err(|e| ReportError::InvalidReport {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Build the render context of `report` for `document`.
///
/// Never fails: missing images keep their path, unreadable or slow ones
/// become diagnostics, and both are counted in [`RenderStats`].
pub async fn render_context(
    report: &Value,
    document: &DocumentHandle,
    store: Arc<dyn FileStore>,
    config: &RenderConfig,
) -> RenderOutput {
    let start = Instant::now();

    // ── Step 1: Derived fields ───────────────────────────────────────────
    let prepared = ContextPreparer::new(store.as_ref(), config).prepare(report);

    // ── Step 2: Collect image leaves ─────────────────────────────────────
    let leaves = collect_image_leaves(&prepared);
    let total = leaves.len();
    info!("Rendering context: {} image leaves", total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_render_start(total);
    }

    // ── Step 3: Materialise concurrently ─────────────────────────────────
    let resolver = DirectResolver::new(
        Arc::new(config.size_rules.clone()),
        ImageMaterializer::new(store, config.source_dpi, document),
    );
    let read_timeout = Duration::from_secs(config.read_timeout_secs);
    let outcomes: Vec<(ImageLeaf, ImageOutcome)> = stream::iter(leaves.into_iter().map(|leaf| {
        let resolver = resolver.clone();
        let cb = config.progress_callback.clone();
        async move {
            if let Some(ref cb) = cb {
                cb.on_image_start(&leaf.path);
            }
            let outcome = resolve_with_timeout(resolver, &leaf, read_timeout).await;
            if let Some(ref cb) = cb {
                notify_outcome(cb, &leaf.path, &outcome);
            }
            (leaf, outcome)
        }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let mut stats = RenderStats {
        images_found: total,
        ..RenderStats::default()
    };
    for (_, outcome) in &outcomes {
        match outcome {
            ImageOutcome::Embedded(_) => stats.images_embedded += 1,
            ImageOutcome::MissingSource => stats.images_missing += 1,
            ImageOutcome::Unreadable(e) => {
                stats.images_failed += 1;
                stats.failures.push(e.clone());
            }
        }
    }

    // ── Step 5: Substitute ───────────────────────────────────────────────
    let prefetched: PrefetchedImages = outcomes.into_iter().collect();
    let root = walk(&prepared, None, &prefetched);
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Context ready: {}/{} images embedded, {} missing, {} failed, {}ms",
        stats.images_embedded, total, stats.images_missing, stats.images_failed, stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_render_complete(total, stats.images_embedded);
    }

    RenderOutput {
        context: RenderContext::new(root, document.id()),
        stats,
    }
}

/// Synchronous wrapper around [`render_context`].
///
/// Creates a temporary tokio runtime internally. The runtime is shut down
/// without waiting for reads abandoned after a timeout, so the call returns
/// within roughly `read_timeout_secs` even when a read stalls.
pub fn render_context_blocking(
    report: &Value,
    document: &DocumentHandle,
    store: Arc<dyn FileStore>,
    config: &RenderConfig,
) -> Result<RenderOutput, ReportError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| ReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
    let output = rt.block_on(render_context(report, document, store, config));
    rt.shutdown_background();
    Ok(output)
}

/// Render `report` through `engine` and write the document into
/// `config.output_dir` as `rapport_manoeuvrabilite_<YYYYmmdd_HHMMSS>.<ext>`.
///
/// A fresh document is opened for every call, so images are read and sized
/// again each time.
pub async fn generate_report(
    report: &Value,
    template: impl AsRef<Path>,
    engine: &dyn TemplateEngine,
    store: Arc<dyn FileStore>,
    config: &RenderConfig,
) -> Result<GeneratedReport, ReportError> {
    let template = template.as_ref();
    if !tokio::fs::try_exists(template).await.unwrap_or(false) {
        return Err(ReportError::TemplateNotFound {
            path: template.to_path_buf(),
        });
    }

    let document = DocumentHandle::open(template);
    debug!(
        "Opened document {} from {}",
        document.id().get(),
        template.display()
    );

    let output = render_context(report, &document, store, config).await;
    let bytes = engine.render(&document, &output.context)?;

    let file_name = format!(
        "{}_{}.{}",
        OUTPUT_FILE_PREFIX,
        Local::now().format("%Y%m%d_%H%M%S"),
        engine.extension()
    );
    let path = config.output_dir.join(&file_name);
    let len = bytes.len();
    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
        .await
        .map_err(|e| ReportError::Internal(format!("write task failed: {e}")))??;
    info!("Report written to {} ({} bytes)", path.display(), len);

    Ok(GeneratedReport {
        path,
        file_name,
        stats: output.stats,
    })
}

/// Write `report` with export annotations as pretty-printed JSON.
///
/// Uses a temp file in the target directory and renames it into place.
pub fn export_json(report: &Value, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let data = annotate_for_export(report);
    let bytes = serde_json::to_vec_pretty(&data)
        .map_err(|e| ReportError::Internal(format!("JSON serialisation failed: {e}")))?;
    write_atomic(path, &bytes)?;

    info!("Report exported to {}", path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve one leaf on a blocking thread, bounded by `read_timeout`.
///
/// A timed-out read is abandoned, not cancelled: the blocking thread runs
/// to completion and its result is dropped.
async fn resolve_with_timeout(
    resolver: DirectResolver,
    leaf: &ImageLeaf,
    read_timeout: Duration,
) -> ImageOutcome {
    let path = leaf.path.clone();
    let key = leaf.key_context.clone();
    let task = tokio::task::spawn_blocking(move || resolver.resolve(&path, key.as_deref()));

    match tokio::time::timeout(read_timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!("Image task for {} failed: {}", leaf.path, e);
            ImageOutcome::Unreadable(ImageError::Decode {
                path: leaf.path.clone(),
                detail: format!("image task failed: {e}"),
            })
        }
        Err(_) => {
            let e = ImageError::Timeout {
                path: leaf.path.clone(),
                secs: read_timeout.as_secs(),
            };
            warn!("{}", e);
            ImageOutcome::Unreadable(e)
        }
    }
}

fn notify_outcome(cb: &ProgressCallback, path: &str, outcome: &ImageOutcome) {
    match outcome {
        ImageOutcome::Embedded(img) => cb.on_image_complete(path, img.width_mm(), img.height_mm()),
        ImageOutcome::MissingSource => cb.on_image_missing(path),
        ImageOutcome::Unreadable(e) => cb.on_image_error(path, &e.to_string()),
    }
}

/// Write `bytes` to a temp file next to `path`, then rename it into place.
///
/// The temp file is removed if any step fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let write_err = |e: std::io::Error| ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
