//! Context walking: rebuild a report with image leaves substituted.
//!
//! The walker carries the *current key* down the tree. A map child is walked
//! with its own key; a sequence element keeps its parent's key, so every
//! picture in `"figures": ["a.png", "b.png"]` is sized by `figures`.
//!
//! Leaf handling is delegated to an [`ImageResolver`], which keeps the
//! traversal pure and lets the same walk replay outcomes computed
//! concurrently ahead of time ([`PrefetchedImages`]).

use crate::pipeline::classify::is_image_path_str;
use crate::pipeline::materialize::{ImageMaterializer, ImageOutcome};
use crate::pipeline::rules::{resolve_bound, SizeRules};
use crate::value::ContextValue;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Decides what an image-shaped leaf becomes.
pub trait ImageResolver {
    fn resolve(&self, path: &str, key_context: Option<&str>) -> ImageOutcome;
}

/// An image-shaped string together with the key it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLeaf {
    pub path: String,
    pub key_context: Option<String>,
}

/// Rebuild `value` with every image-shaped leaf replaced per `resolver`.
///
/// - [`ImageOutcome::Embedded`] → [`ContextValue::Image`]
/// - [`ImageOutcome::MissingSource`] → the original string
/// - [`ImageOutcome::Unreadable`] → `"[Image unavailable: <basename>]"`
///
/// Everything else is copied through unchanged.
pub fn walk(value: &Value, key_context: Option<&str>, resolver: &dyn ImageResolver) -> ContextValue {
    match value {
        Value::Object(m) => ContextValue::Map(
            m.iter()
                .map(|(k, v)| (k.clone(), walk(v, Some(k.as_str()), resolver)))
                .collect(),
        ),
        Value::Array(items) => ContextValue::Seq(
            items
                .iter()
                .map(|v| walk(v, key_context, resolver))
                .collect(),
        ),
        Value::String(s) if is_image_path_str(s) => match resolver.resolve(s, key_context) {
            ImageOutcome::Embedded(img) => ContextValue::Image(img),
            ImageOutcome::MissingSource => ContextValue::String(s.clone()),
            ImageOutcome::Unreadable(e) => ContextValue::String(e.diagnostic()),
        },
        scalar => ContextValue::from(scalar),
    }
}

/// Every image-shaped leaf in `value`, in traversal order, de-duplicated.
pub fn collect_image_leaves(value: &Value) -> Vec<ImageLeaf> {
    let mut leaves = Vec::new();
    collect_into(value, None, &mut leaves);
    let mut seen = HashSet::new();
    leaves.retain(|l| seen.insert(l.clone()));
    leaves
}

fn collect_into(value: &Value, key_context: Option<&str>, out: &mut Vec<ImageLeaf>) {
    match value {
        Value::Object(m) => m.iter().for_each(|(k, v)| collect_into(v, Some(k.as_str()), out)),
        Value::Array(items) => items.iter().for_each(|v| collect_into(v, key_context, out)),
        Value::String(s) if is_image_path_str(s) => out.push(ImageLeaf {
            path: s.clone(),
            key_context: key_context.map(str::to_string),
        }),
        _ => {}
    }
}

/// Resolve leaves directly: existence check, size rule, materialisation.
#[derive(Clone)]
pub struct DirectResolver {
    rules: Arc<SizeRules>,
    materializer: ImageMaterializer,
}

impl DirectResolver {
    pub fn new(rules: Arc<SizeRules>, materializer: ImageMaterializer) -> Self {
        Self {
            rules,
            materializer,
        }
    }
}

impl ImageResolver for DirectResolver {
    fn resolve(&self, path: &str, key_context: Option<&str>) -> ImageOutcome {
        if !self.materializer.store().exists(path) {
            debug!("Image source not found, left unresolved: {}", path);
            return ImageOutcome::MissingSource;
        }
        let bound = resolve_bound(key_context, &self.rules);
        self.materializer.materialize(path, bound)
    }
}

/// Outcomes computed ahead of the walk, keyed by leaf.
///
/// Leaves without a recorded outcome resolve to [`ImageOutcome::MissingSource`].
#[derive(Debug, Clone, Default)]
pub struct PrefetchedImages {
    outcomes: HashMap<ImageLeaf, ImageOutcome>,
}

impl PrefetchedImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, leaf: ImageLeaf, outcome: ImageOutcome) {
        self.outcomes.insert(leaf, outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&ImageLeaf, &ImageOutcome)> {
        self.outcomes.iter()
    }
}

impl FromIterator<(ImageLeaf, ImageOutcome)> for PrefetchedImages {
    fn from_iter<I: IntoIterator<Item = (ImageLeaf, ImageOutcome)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl ImageResolver for PrefetchedImages {
    fn resolve(&self, path: &str, key_context: Option<&str>) -> ImageOutcome {
        let leaf = ImageLeaf {
            path: path.to_string(),
            key_context: key_context.map(str::to_string),
        };
        self.outcomes
            .get(&leaf)
            .cloned()
            .unwrap_or(ImageOutcome::MissingSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentHandle;
    use crate::error::{diagnostic_placeholder, ImageError};
    use crate::store::MemoryFileStore;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::cell::RefCell;
    use std::io::Cursor;

    /// Records every call and answers MissingSource.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, Option<String>)>>,
    }

    impl ImageResolver for Recorder {
        fn resolve(&self, path: &str, key_context: Option<&str>) -> ImageOutcome {
            self.calls
                .borrow_mut()
                .push((path.to_string(), key_context.map(str::to_string)));
            ImageOutcome::MissingSource
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn direct(store: MemoryFileStore, doc: &DocumentHandle) -> DirectResolver {
        DirectResolver::new(
            Arc::new(SizeRules::default()),
            ImageMaterializer::new(Arc::new(store), 96.0, doc),
        )
    }

    #[test]
    fn non_image_tree_is_unchanged() {
        let v = json!({
            "titre": "Étude de manœuvrabilité",
            "annee": 2024,
            "valide": true,
            "vide": null,
            "tableaux": ["uploads/t.xlsx"],
            "nested": {"list": [1, 2.5, {"deep": [[]]}]}
        });
        let out = walk(&v, None, &Recorder::default());
        assert_eq!(out, ContextValue::from(&v));
    }

    #[test]
    fn sequences_carry_the_parent_key() {
        let v = json!({
            "figures": ["a.png", {"chemin": "b.jpg"}],
            "metadonnees": {"client_logo": "logo.gif"}
        });
        let rec = Recorder::default();
        walk(&v, None, &rec);
        assert_eq!(
            rec.calls.into_inner(),
            vec![
                ("a.png".to_string(), Some("figures".to_string())),
                ("b.jpg".to_string(), Some("chemin".to_string())),
                ("logo.gif".to_string(), Some("client_logo".to_string())),
            ]
        );
    }

    #[test]
    fn root_sequence_has_no_key_context() {
        let rec = Recorder::default();
        walk(&json!(["x.bmp"]), None, &rec);
        assert_eq!(rec.calls.into_inner(), vec![("x.bmp".to_string(), None)]);
    }

    #[test]
    fn shape_is_preserved_around_substitutions() {
        let doc = DocumentHandle::open("t.docx");
        let store = MemoryFileStore::new().with_file("uploads/a.png", png(10, 10));
        let v = json!({"b": ["uploads/a.png", "uploads/ghost.png", 3], "a": {}});
        let out = walk(&v, None, &direct(store, &doc));

        let ContextValue::Map(m) = &out else {
            panic!("expected map")
        };
        let keys: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a"]);
        let seq = m["b"].as_seq().unwrap();
        assert_eq!(seq.len(), 3);
        assert!(seq[0].as_image().is_some());
        assert_eq!(seq[1].as_str(), Some("uploads/ghost.png"));
        assert_eq!(m["a"], ContextValue::Map(Default::default()));
    }

    #[test]
    fn missing_leaves_path_and_unreadable_gets_diagnostic() {
        let doc = DocumentHandle::open("t.docx");
        let store = MemoryFileStore::new().with_file("uploads/broken.png", b"garbage".to_vec());
        let resolver = direct(store, &doc);

        let missing = walk(&json!("uploads/ghost.png"), None, &resolver);
        assert_eq!(missing, ContextValue::String("uploads/ghost.png".into()));

        let broken = walk(&json!("uploads/broken.png"), None, &resolver);
        let text = broken.as_str().unwrap();
        assert!(text.contains("broken.png"), "got: {text}");
        assert_eq!(text, diagnostic_placeholder("uploads/broken.png"));
    }

    #[test]
    fn input_is_not_mutated() {
        let doc = DocumentHandle::open("t.docx");
        let store = MemoryFileStore::new().with_file("a.png", png(4, 4));
        let v = json!({"figure": "a.png"});
        let before = v.clone();
        let _ = walk(&v, None, &direct(store, &doc));
        assert_eq!(v, before);
    }

    #[test]
    fn collect_leaves_dedupes_by_path_and_key() {
        let v = json!({
            "figure": "a.png",
            "other": {"figure": "a.png"},
            "logo": "a.png",
            "text": "hello"
        });
        let leaves = collect_image_leaves(&v);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].key_context.as_deref(), Some("figure"));
        assert_eq!(leaves[1].key_context.as_deref(), Some("logo"));
    }

    #[test]
    fn prefetched_replays_outcomes() {
        let leaf = ImageLeaf {
            path: "uploads/x.png".into(),
            key_context: Some("planche".into()),
        };
        let err = ImageError::Timeout {
            path: "uploads/x.png".into(),
            secs: 1,
        };
        let pre: PrefetchedImages = [(leaf, ImageOutcome::Unreadable(err))].into_iter().collect();

        let v = json!({"planche": "uploads/x.png", "figure": "uploads/x.png"});
        let out = walk(&v, None, &pre);
        assert_eq!(
            out.get("planche").and_then(ContextValue::as_str),
            Some("[Image unavailable: x.png]")
        );
        // Same path under an unrecorded key falls back to MissingSource.
        assert_eq!(
            out.get("figure").and_then(ContextValue::as_str),
            Some("uploads/x.png")
        );
    }

    #[test]
    fn deep_nesting_is_walked() {
        let mut v = json!("deep.png");
        for _ in 0..200 {
            v = json!({"level": [v]});
        }
        let rec = Recorder::default();
        walk(&v, None, &rec);
        assert_eq!(rec.calls.into_inner().len(), 1);
    }
}
