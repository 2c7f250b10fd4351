//! # manoeuvre-report
//!
//! Turn a ship-manoeuvrability study report into a render context for
//! document templating.
//!
//! A report is an arbitrarily nested JSON record collected by a form. Some
//! of its string leaves are paths to uploaded pictures (ship silhouettes,
//! simulation plates, the client logo). Before the report can be poured
//! into the company template, those paths must become images embedded at a
//! physical size that depends on *where* they sit in the report, and a few
//! derived fields (formatted dates, success rate) must be added.
//!
//! ## Pipeline Overview
//!
//! ```text
//! report.json
//!  │
//!  ├─ 1. Prepare      dates → dd/mm/yyyy, *_exists flags, taux_reussite_pct
//!  ├─ 2. Collect      every image-shaped leaf with the key it sits under
//!  ├─ 3. Materialise  read + decode + size at 96 DPI (concurrent, timeout)
//!  ├─ 4. Substitute   walk again, leaves → Image | path | diagnostic
//!  └─ 5. Render       TemplateEngine → document bytes, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manoeuvre_report::{generate_report, load_report, JsonContextEngine, LocalFileStore, RenderConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = load_report("rapport.json").await?;
//!     let config = RenderConfig::default();
//!     let out = generate_report(
//!         &report,
//!         "templates/report_template.docx",
//!         &JsonContextEngine::default(),
//!         Arc::new(LocalFileStore::new()),
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} ({} images embedded)", out.path.display(), out.stats.images_embedded);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mreport` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! manoeuvre-report = { version = "0.1", default-features = false }
//! ```
//!
//! ## Image sizes
//!
//! | Key contains   | Max size (mm) |
//! |----------------|---------------|
//! | `client_logo`  | 25 × 25       |
//! | `logo`         | 30 × 30       |
//! | `main_image`, `main` | 140 × 100 |
//! | `gallery`      | 100 × 80      |
//! | `simulation`, `figure` | 120 × 90 |
//! | `planche`      | 140 × 100     |
//! | anything else  | 120 × 90      |
//!
//! First match wins; see [`SizeRules`] to supply a different table.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod store;
pub mod template;
pub mod value;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RenderConfig, RenderConfigBuilder, DEFAULT_SOURCE_DPI};
pub use document::{DocumentHandle, DocumentId, InlineImage};
pub use error::{ImageError, ReportError};
pub use generate::{
    export_json, generate_report, load_report, render_context, render_context_blocking,
    GeneratedReport, RenderOutput, RenderStats,
};
pub use pipeline::{ImageOutcome, SizeBound, SizeRule, SizeRules};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use report::{validate_report, ReportSummary, ValidationIssue};
pub use store::{FileStore, LocalFileStore, MemoryFileStore};
pub use template::{format_date, format_success_rate, JsonContextEngine, TemplateEngine};
pub use value::{ContextValue, ImageEncoding, RenderContext};
