//! Error types for the manoeuvre-report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReportError`]: **Fatal**: the export cannot proceed at all (report
//!   file unreadable, template missing, output directory not writable).
//!   Returned as `Err(ReportError)` from the top-level entry points.
//!
//! * [`ImageError`]: **Non-fatal**: a single image could not be
//!   materialised (corrupt file, unsupported codec, stalled mount). It is
//!   carried inside [`crate::pipeline::ImageOutcome::Unreadable`] and turned
//!   into a bracketed diagnostic in the rendered document, so one bad upload
//!   never blocks the export.
//!
//! The context walker itself never fails: every fatal condition belongs to
//! the surface around it (loading, templating, writing).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// All fatal errors returned by the manoeuvre-report library.
///
/// Image-level failures use [`ImageError`] and are substituted inline
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Report JSON file was not found at the given path.
    #[error("Report file not found: '{path}'\nCheck the path exists and is readable.")]
    ReportNotFound { path: PathBuf },

    /// The report file exists but is not valid JSON.
    #[error("Report '{path}' is not valid JSON: {detail}")]
    InvalidReport { path: PathBuf, detail: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// The template the document is generated from does not exist.
    #[error("Template not found: '{path}'\nPlace the company template at this path or pass --template.")]
    TemplateNotFound { path: PathBuf },

    /// An embedded image was bound to a different document than the one
    /// being rendered.
    #[error("Image '{path}' was materialised for another document and cannot be rendered here")]
    ForeignImage { path: String },

    /// The template engine failed to produce the document.
    #[error("Template rendering failed: {0}")]
    RenderFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
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

/// A non-fatal error for a single image.
///
/// The render continues; the walker substitutes [`ImageError::diagnostic`]
/// for the failed leaf.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ImageError {
    /// The file exists but could not be opened or read.
    #[error("Image '{path}': could not be read: {detail}")]
    Open { path: String, detail: String },

    /// The bytes were read but are not a decodable image.
    #[error("Image '{path}': decoding failed: {detail}")]
    Decode { path: String, detail: String },

    /// The image decoded to a zero-sized raster.
    #[error("Image '{path}': has zero width or height")]
    EmptyImage { path: String },

    /// Reading the file did not finish within the configured bound.
    #[error("Image '{path}': read timed out after {secs}s")]
    Timeout { path: String, secs: u64 },
}

impl ImageError {
    /// The path of the image that failed.
    pub fn path(&self) -> &str {
        match self {
            ImageError::Open { path, .. }
            | ImageError::Decode { path, .. }
            | ImageError::EmptyImage { path }
            | ImageError::Timeout { path, .. } => path,
        }
    }

    /// Placeholder text shown in the rendered document instead of the image.
    pub fn diagnostic(&self) -> String {
        diagnostic_placeholder(self.path())
    }
}

/// `"[Image unavailable: <basename>]"` for the given path.
pub fn diagnostic_placeholder(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    format!("[Image unavailable: {name}]")
}
