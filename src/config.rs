//! Configuration types for render-context preparation.
//!
//! All export behaviour is controlled through [`RenderConfig`], built via its
//! [`RenderConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share a config across concurrent image tasks and to log exactly which
//! settings produced a given document.

use crate::error::ReportError;
use crate::pipeline::rules::SizeRules;
use crate::progress::ProgressCallback;
use crate::value::ImageEncoding;
use std::fmt;
use std::path::PathBuf;

/// Resolution assumed for every source image when converting pixels to
/// millimetres. Uploaded images rarely carry trustworthy DPI metadata.
pub const DEFAULT_SOURCE_DPI: f64 = 96.0;

/// Outcome labels counted as a successful simulation run.
pub const DEFAULT_SUCCESS_OUTCOMES: &[&str] = &["Réussite", "success"];

/// Configuration for a render pass.
///
/// Built via [`RenderConfig::builder()`] or using [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use manoeuvre_report::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .concurrency(8)
///     .read_timeout_secs(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.source_dpi, 96.0);
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Pixels per inch assumed for source images. Default: 96.
    pub source_dpi: f64,

    /// Ordered keyword → bound table used to size embedded images.
    pub size_rules: SizeRules,

    /// Number of images materialised concurrently. Default: 4.
    ///
    /// Image reads are independent; raising this only helps when uploads
    /// live on slow storage.
    pub concurrency: usize,

    /// Per-image read timeout in seconds. Default: 10.
    ///
    /// An image that has not been read and decoded within this bound is
    /// reported as unavailable instead of stalling the export.
    pub read_timeout_secs: u64,

    /// Directory generated documents are written to. Default: `exports`.
    pub output_dir: PathBuf,

    /// `resultat` values counted as a successful simulation.
    pub success_outcomes: Vec<String>,

    /// Inline image bytes as base64 data URIs in JSON context output
    /// (see [`RenderConfig::image_encoding`]). Default: false.
    pub embed_image_data: bool,

    /// Optional per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            source_dpi: DEFAULT_SOURCE_DPI,
            size_rules: SizeRules::default(),
            concurrency: 4,
            read_timeout_secs: 10,
            output_dir: PathBuf::from("exports"),
            success_outcomes: DEFAULT_SUCCESS_OUTCOMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            embed_image_data: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("source_dpi", &self.source_dpi)
            .field("size_rules", &self.size_rules)
            .field("concurrency", &self.concurrency)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("success_outcomes", &self.success_outcomes)
            .field("embed_image_data", &self.embed_image_data)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `outcome` is one of the configured success labels.
    pub fn is_success_outcome(&self, outcome: &str) -> bool {
        self.success_outcomes.iter().any(|s| s == outcome)
    }

    /// Image encoding selected by `embed_image_data`.
    pub fn image_encoding(&self) -> ImageEncoding {
        if self.embed_image_data {
            ImageEncoding::DataUri
        } else {
            ImageEncoding::Descriptor
        }
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn source_dpi(mut self, dpi: f64) -> Self {
        self.config.source_dpi = dpi;
        self
    }

    pub fn size_rules(mut self, rules: SizeRules) -> Self {
        self.config.size_rules = rules;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.read_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn success_outcomes<I, S>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.success_outcomes = outcomes.into_iter().map(Into::into).collect();
        self
    }

    pub fn embed_image_data(mut self, v: bool) -> Self {
        self.config.embed_image_data = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, ReportError> {
        let c = &self.config;
        if !c.source_dpi.is_finite() || c.source_dpi <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "Source DPI must be a positive number, got {}",
                c.source_dpi
            )));
        }
        if c.read_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "Read timeout must be ≥ 1 second".into(),
            ));
        }
        if c.success_outcomes.is_empty() {
            return Err(ReportError::InvalidConfig(
                "At least one success outcome label is required".into(),
            ));
        }
        c.size_rules.validate()?;
        Ok(self.config)
    }
}
