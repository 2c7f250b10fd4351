//! Render-context values.
//!
//! A report arrives as an untyped [`serde_json::Value`]. The walker rebuilds
//! it as a [`ContextValue`], the same tree with one extra leaf kind:
//! [`ContextValue::Image`], an image materialised for a specific document.

use crate::document::{DocumentId, InlineImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Number, Value};

/// A node of the render context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<ContextValue>),
    Map(IndexMap<String, ContextValue>),
    Image(InlineImage),
}

/// How images are written when a context is turned back into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageEncoding {
    /// Path, physical size and MIME type only. (default)
    #[default]
    Descriptor,
    /// Descriptor plus a `data:` URI holding the file bytes.
    DataUri,
}

impl ContextValue {
    /// Child of a map by key; `None` for other variants.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        match self {
            ContextValue::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&InlineImage> {
        match self {
            ContextValue::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[ContextValue]> {
        match self {
            ContextValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Every embedded image in the tree, depth-first.
    pub fn images(&self) -> Vec<&InlineImage> {
        let mut out = Vec::new();
        self.collect_images(&mut out);
        out
    }

    fn collect_images<'a>(&'a self, out: &mut Vec<&'a InlineImage>) {
        match self {
            ContextValue::Image(img) => out.push(img),
            ContextValue::Seq(items) => items.iter().for_each(|v| v.collect_images(out)),
            ContextValue::Map(m) => m.values().for_each(|v| v.collect_images(out)),
            _ => {}
        }
    }

    /// JSON view of the tree; images become descriptor objects.
    pub fn to_json(&self, encoding: ImageEncoding) -> Value {
        match self {
            ContextValue::Null => Value::Null,
            ContextValue::Bool(b) => Value::Bool(*b),
            ContextValue::Number(n) => Value::Number(n.clone()),
            ContextValue::String(s) => Value::String(s.clone()),
            ContextValue::Seq(items) => {
                Value::Array(items.iter().map(|v| v.to_json(encoding)).collect())
            }
            ContextValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json(encoding)))
                    .collect(),
            ),
            ContextValue::Image(img) => image_json(img, encoding),
        }
    }
}

fn image_json(img: &InlineImage, encoding: ImageEncoding) -> Value {
    let mut v = json!({
        "image": img.path(),
        "width_mm": img.width_mm(),
        "height_mm": img.height_mm(),
        "mime_type": img.mime_type(),
    });
    if encoding == ImageEncoding::DataUri {
        v["data_uri"] = Value::String(format!(
            "data:{};base64,{}",
            img.mime_type(),
            STANDARD.encode(img.data())
        ));
    }
    v
}

impl From<&Value> for ContextValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => ContextValue::Null,
            Value::Bool(b) => ContextValue::Bool(*b),
            Value::Number(n) => ContextValue::Number(n.clone()),
            Value::String(s) => ContextValue::String(s.clone()),
            Value::Array(items) => ContextValue::Seq(items.iter().map(Into::into).collect()),
            Value::Object(m) => ContextValue::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), ContextValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for ContextValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContextValue::Null => serializer.serialize_unit(),
            ContextValue::Bool(b) => serializer.serialize_bool(*b),
            ContextValue::Number(n) => n.serialize(serializer),
            ContextValue::String(s) => serializer.serialize_str(s),
            ContextValue::Seq(items) => items.serialize(serializer),
            ContextValue::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ContextValue::Image(img) => img.serialize(serializer),
        }
    }
}

/// The fully prepared context handed to a template engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    root: ContextValue,
    document: DocumentId,
}

impl RenderContext {
    pub fn new(root: ContextValue, document: DocumentId) -> Self {
        Self { root, document }
    }

    pub fn root(&self) -> &ContextValue {
        &self.root
    }

    pub fn into_root(self) -> ContextValue {
        self.root
    }

    /// Document the context's images were materialised for.
    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Top-level section by key.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.root.get(key)
    }

    pub fn to_json(&self, encoding: ImageEncoding) -> Value {
        self.root.to_json(encoding)
    }
}
