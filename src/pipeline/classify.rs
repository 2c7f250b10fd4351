//! Path classification: does a report value look like a raster image path?
//!
//! Extension check only. Whether the file exists is decided later against
//! the [`crate::store::FileStore`], because the two failure points
//! (absent vs. unreadable) have different observable outputs.

use serde_json::Value;
use std::path::Path;

/// Recognised raster-image extensions, lowercase, without the dot.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// True only for a string value whose lowercased extension is an image extension.
pub fn is_image_path(value: &Value) -> bool {
    match value {
        Value::String(s) => is_image_path_str(s),
        _ => false,
    }
}

/// String form of [`is_image_path`].
pub fn is_image_path_str(s: &str) -> bool {
    Path::new(s)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
