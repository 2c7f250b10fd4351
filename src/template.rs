//! Template engine seam and the bundled JSON context engine.
//!
//! The real document engine (Word templating) lives outside this crate. It
//! receives a [`RenderContext`] whose images are already sized and bound
//! to the document it is rendering, and returns the finished bytes.

use crate::config::RenderConfig;
use crate::document::DocumentHandle;
use crate::error::ReportError;
use crate::value::{ImageEncoding, RenderContext};
use serde_json::{json, Value};

pub use crate::pipeline::prepare::format_date;

/// Renders a prepared context into a document.
pub trait TemplateEngine: Send + Sync {
    /// Render `context` into `document`, returning the file bytes.
    fn render(&self, document: &DocumentHandle, context: &RenderContext)
        -> Result<Vec<u8>, ReportError>;

    /// File extension of the produced documents, without the dot.
    fn extension(&self) -> &str;
}

/// Writes the render context as pretty-printed JSON.
///
/// Stands in for a document engine in previews, pipelines that post-process
/// the context elsewhere, and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContextEngine {
    encoding: ImageEncoding,
}

impl JsonContextEngine {
    pub fn new(encoding: ImageEncoding) -> Self {
        Self { encoding }
    }

    /// Engine using the encoding chosen by `config.embed_image_data`.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.image_encoding())
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }
}

impl TemplateEngine for JsonContextEngine {
    fn render(
        &self,
        document: &DocumentHandle,
        context: &RenderContext,
    ) -> Result<Vec<u8>, ReportError> {
        if let Some(foreign) = context.root().images().into_iter().find(|img| !document.owns(img)) {
            return Err(ReportError::ForeignImage {
                path: foreign.path().to_string(),
            });
        }

        let out = json!({
            "template": document.template().to_string_lossy(),
            "context": context.to_json(self.encoding),
        });
        serde_json::to_vec_pretty(&out).map_err(|e| ReportError::RenderFailed(e.to_string()))
    }

    fn extension(&self) -> &str {
        "json"
    }
}

/// Format a 0–1 success fraction as a percentage: `0.75` → `"75.0%"`.
///
/// Anything that is not a number renders as `"0%"`.
pub fn format_success_rate(value: &Value) -> String {
    match value.as_f64() {
        Some(rate) => format!("{:.1}%", rate * 100.0),
        None => "0%".to_string(),
    }
}
