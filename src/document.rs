//! Target document handle and the images bound to it.
//!
//! An [`InlineImage`] is only valid for the document it was materialised
//! for: its size was computed for that render pass and its bytes were read
//! at that moment. Template engines check [`InlineImage::document`] against
//! the handle they are rendering.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one document instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// One document being generated from a template.
///
/// Opaque to the pipeline; it only hands the id to every image it creates.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    id: DocumentId,
    template: PathBuf,
}

impl DocumentHandle {
    /// A fresh document instance for `template`. Each call yields a new id.
    pub fn open(template: impl Into<PathBuf>) -> Self {
        Self {
            id: DocumentId::next(),
            template: template.into(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    /// Whether `image` was materialised for this document.
    pub fn owns(&self, image: &InlineImage) -> bool {
        image.document == self.id
    }
}

/// A decoded image scaled for embedding into a specific document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineImage {
    pub(crate) document: DocumentId,
    pub(crate) path: String,
    pub(crate) width_mm: f64,
    pub(crate) height_mm: f64,
    pub(crate) pixel_width: u32,
    pub(crate) pixel_height: u32,
    pub(crate) mime_type: &'static str,
    #[serde(skip)]
    pub(crate) data: Arc<[u8]>,
}

impl InlineImage {
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Report path the image was read from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn width_mm(&self) -> f64 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f64 {
        self.height_mm
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Raw file bytes, as read during materialisation.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
