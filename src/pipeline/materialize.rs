//! Image materialisation: report path → [`InlineImage`] sized for its context.
//!
//! ## Sizing
//!
//! Uploaded images carry no reliable physical size, so every source is
//! assumed to be `source_dpi` (96) pixels per inch. The resulting size in
//! millimetres is shrunk by a single factor until both axes fit the bound
//! resolved for the key; images already inside the bound keep their size.
//!
//! ## Failure isolation
//!
//! [`ImageMaterializer::materialize`] never fails: open, read and decode
//! errors come back as [`ImageOutcome::Unreadable`], which the walker turns
//! into a diagnostic string.

use crate::document::{DocumentHandle, DocumentId, InlineImage};
use crate::error::ImageError;
use crate::pipeline::rules::SizeBound;
use crate::store::FileStore;
use image::ImageReader;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::{debug, warn};

const MM_PER_INCH: f64 = 25.4;

/// Result of resolving one image-shaped leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// The image was read and scaled for the target document.
    Embedded(InlineImage),
    /// The path does not exist on the file store; the leaf is left as is.
    MissingSource,
    /// The path exists but the image could not be materialised.
    Unreadable(ImageError),
}

/// Physical size in millimetres of a `px` raster at `dpi`.
pub fn physical_size_mm(px: (u32, u32), dpi: f64) -> (f64, f64) {
    (
        px.0 as f64 * MM_PER_INCH / dpi,
        px.1 as f64 * MM_PER_INCH / dpi,
    )
}

/// Physical size of `px` at `dpi`, uniformly downscaled to fit `bound`.
///
/// Never upscales: when both axes already fit, the physical size is
/// returned unchanged.
pub fn fit_within(px: (u32, u32), dpi: f64, bound: SizeBound) -> (f64, f64) {
    let (w, h) = physical_size_mm(px, dpi);
    if w > bound.max_width_mm || h > bound.max_height_mm {
        let scale = (bound.max_width_mm / w).min(bound.max_height_mm / h);
        (w * scale, h * scale)
    } else {
        (w, h)
    }
}

/// Reads images from a [`FileStore`] and binds them to one document.
#[derive(Clone)]
pub struct ImageMaterializer {
    store: Arc<dyn FileStore>,
    source_dpi: f64,
    document: DocumentId,
}

impl ImageMaterializer {
    pub fn new(store: Arc<dyn FileStore>, source_dpi: f64, document: &DocumentHandle) -> Self {
        Self {
            store,
            source_dpi,
            document: document.id(),
        }
    }

    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Materialise the image at `path` within `bound`.
    ///
    /// `path` is expected to be image-shaped and existing; a read failure is
    /// still reported as [`ImageOutcome::Unreadable`], never a panic.
    pub fn materialize(&self, path: &str, bound: SizeBound) -> ImageOutcome {
        match self.try_materialize(path, bound) {
            Ok(img) => {
                debug!(
                    "Embedded {} → {:.1}×{:.1} mm ({}×{} px)",
                    path, img.width_mm, img.height_mm, img.pixel_width, img.pixel_height
                );
                ImageOutcome::Embedded(img)
            }
            Err(e) => {
                warn!("{}", e);
                ImageOutcome::Unreadable(e)
            }
        }
    }

    fn try_materialize(&self, path: &str, bound: SizeBound) -> Result<InlineImage, ImageError> {
        let mut data = Vec::new();
        self.store
            .open(path)
            .and_then(|mut r| r.read_to_end(&mut data))
            .map_err(|e| ImageError::Open {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        let decode_err = |detail: String| ImageError::Decode {
            path: path.to_string(),
            detail,
        };

        let reader = ImageReader::new(Cursor::new(&data[..]))
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| decode_err("unrecognised image format".into()))?;
        let decoded = reader.decode().map_err(|e| decode_err(e.to_string()))?;

        let px = (decoded.width(), decoded.height());
        if px.0 == 0 || px.1 == 0 {
            return Err(ImageError::EmptyImage {
                path: path.to_string(),
            });
        }

        let (width_mm, height_mm) = fit_within(px, self.source_dpi, bound);

        Ok(InlineImage {
            document: self.document,
            path: path.to_string(),
            width_mm,
            height_mm,
            pixel_width: px.0,
            pixel_height: px.1,
            mime_type: format.to_mime_type(),
            data: Arc::from(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFileStore;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 90, 160])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    fn materializer(store: MemoryFileStore, doc: &DocumentHandle) -> ImageMaterializer {
        ImageMaterializer::new(Arc::new(store), 96.0, doc)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn physical_size_at_96_dpi() {
        let (w, h) = physical_size_mm((96, 192), 96.0);
        assert!(approx(w, 25.4));
        assert!(approx(h, 50.8));
    }

    #[test]
    fn downscale_preserves_aspect_and_pins_one_axis() {
        let bound = SizeBound::new(120.0, 90.0);
        for px in [(1600, 1200), (3000, 1000), (800, 2400), (4000, 4000)] {
            let (w, h) = fit_within(px, 96.0, bound);
            let ratio = px.0 as f64 / px.1 as f64;
            assert!((w / h - ratio).abs() < 1e-9, "{px:?}: aspect changed");
            assert!(w <= bound.max_width_mm + 1e-9 && h <= bound.max_height_mm + 1e-9);
            assert!(
                approx(w, bound.max_width_mm) || approx(h, bound.max_height_mm),
                "{px:?}: no axis pinned ({w}, {h})"
            );
        }
    }

    #[test]
    fn no_upscale_within_bounds() {
        let bound = SizeBound::new(120.0, 90.0);
        let px = (200, 100);
        assert_eq!(fit_within(px, 96.0, bound), physical_size_mm(px, 96.0));
    }

    #[test]
    fn exceeding_only_one_axis_still_scales_both() {
        // 30 mm wide, 100 mm tall against a 120×90 bound.
        let px = (113, 378);
        let (w, h) = fit_within(px, 96.0, SizeBound::new(120.0, 90.0));
        assert!(approx(h, 90.0));
        let (pw, _) = physical_size_mm(px, 96.0);
        assert!(w < pw);
    }

    #[test]
    fn materializes_png_bound_to_document() {
        let doc = DocumentHandle::open("t.docx");
        let store = MemoryFileStore::new().with_file("uploads/a.png", png_bytes(96, 48));
        let m = materializer(store, &doc);

        match m.materialize("uploads/a.png", SizeBound::new(120.0, 90.0)) {
            ImageOutcome::Embedded(img) => {
                assert!(doc.owns(&img));
                assert_eq!(img.pixel_size(), (96, 48));
                assert!(approx(img.width_mm(), 25.4));
                assert!(approx(img.height_mm(), 12.7));
                assert_eq!(img.mime_type(), "image/png");
                assert!(!img.data().is_empty());
            }
            other => panic!("expected embedded image, got {other:?}"),
        }
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let doc = DocumentHandle::open("t.docx");
        let store = MemoryFileStore::new().with_file("uploads/broken.png", b"not an image".to_vec());
        let m = materializer(store, &doc);

        match m.materialize("uploads/broken.png", SizeBound::new(120.0, 90.0)) {
            ImageOutcome::Unreadable(e) => {
                assert!(matches!(e, ImageError::Decode { .. }));
                assert!(e.diagnostic().contains("broken.png"));
            }
            other => panic!("expected unreadable, got {other:?}"),
        }
    }

    #[test]
    fn truncated_png_is_unreadable() {
        let doc = DocumentHandle::open("t.docx");
        let mut bytes = png_bytes(64, 64);
        bytes.truncate(bytes.len() / 2);
        let store = MemoryFileStore::new().with_file("cut.png", bytes);
        let m = materializer(store, &doc);

        assert!(matches!(
            m.materialize("cut.png", SizeBound::new(120.0, 90.0)),
            ImageOutcome::Unreadable(_)
        ));
    }

    #[test]
    fn open_failure_is_unreadable_not_missing() {
        let doc = DocumentHandle::open("t.docx");
        let m = materializer(MemoryFileStore::new(), &doc);

        match m.materialize("uploads/gone.png", SizeBound::new(120.0, 90.0)) {
            ImageOutcome::Unreadable(ImageError::Open { path, .. }) => {
                assert_eq!(path, "uploads/gone.png")
            }
            other => panic!("expected open error, got {other:?}"),
        }
    }
}
