//! Progress-callback trait for per-image render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::RenderConfigBuilder::progress_callback`] to receive
//! events as the pipeline materialises each image.
//!
//! # Example
//!
//! ```rust
//! use manoeuvre_report::{RenderConfig, RenderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     embedded: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, path: &str, width_mm: f64, height_mm: f64) {
//!         self.embedded.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{path}: {width_mm:.1} × {height_mm:.1} mm");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { embedded: AtomicUsize::new(0) });
//! let config = RenderConfig::builder()
//!     .progress_callback(cb as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the render pipeline as it materialises each image.
///
/// Implementations must be `Send + Sync`: sibling images are materialised
/// concurrently, so `on_image_*` may be called from different tasks at the
/// same time. All methods have default no-op implementations.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once after image leaves are collected, before any is read.
    fn on_render_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before an image file is read.
    fn on_image_start(&self, path: &str) {
        let _ = path;
    }

    /// Called when an image was embedded at the given physical size.
    fn on_image_complete(&self, path: &str, width_mm: f64, height_mm: f64) {
        let _ = (path, width_mm, height_mm);
    }

    /// Called when an image-shaped path does not exist on the file store.
    fn on_image_missing(&self, path: &str) {
        let _ = path;
    }

    /// Called when an existing image could not be materialised.
    fn on_image_error(&self, path: &str, error: &str) {
        let _ = (path, error);
    }

    /// Called once after all images have been attempted.
    fn on_render_complete(&self, total_images: usize, embedded: usize) {
        let _ = (total_images, embedded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderConfig`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;
