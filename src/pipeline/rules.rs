//! Size rules: map a structural key to the maximum physical size of the
//! image embedded under it.
//!
//! ## Rule order
//!
//! Matching is case-insensitive substring containment, first rule wins, so
//! declaration order *is* precedence. `client_logo` contains `logo`; the
//! default table therefore lists `client_logo` first, otherwise client logos
//! would get the larger generic logo bound.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};

/// Maximum width/height, in millimetres, for an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeBound {
    pub max_width_mm: f64,
    pub max_height_mm: f64,
}

impl SizeBound {
    pub const fn new(max_width_mm: f64, max_height_mm: f64) -> Self {
        Self {
            max_width_mm,
            max_height_mm,
        }
    }
}

/// One `keyword → bound` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRule {
    pub keyword: String,
    #[serde(flatten)]
    pub bound: SizeBound,
}

impl SizeRule {
    pub fn new(keyword: impl Into<String>, max_width_mm: f64, max_height_mm: f64) -> Self {
        Self {
            keyword: keyword.into(),
            bound: SizeBound::new(max_width_mm, max_height_mm),
        }
    }
}

/// Ordered rule table plus the bound applied when nothing matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRules {
    rules: Vec<SizeRule>,
    fallback: SizeBound,
}

/// Bound applied to keys that match no rule.
pub const FALLBACK_BOUND: SizeBound = SizeBound::new(120.0, 90.0);

impl Default for SizeRules {
    fn default() -> Self {
        Self::new(
            vec![
                SizeRule::new("client_logo", 25.0, 25.0),
                SizeRule::new("logo", 30.0, 30.0),
                SizeRule::new("main_image", 140.0, 100.0),
                SizeRule::new("main", 140.0, 100.0),
                SizeRule::new("gallery", 100.0, 80.0),
                SizeRule::new("simulation", 120.0, 90.0),
                SizeRule::new("figure", 120.0, 90.0),
                SizeRule::new("planche", 140.0, 100.0),
            ],
            FALLBACK_BOUND,
        )
    }
}

impl SizeRules {
    /// Rules are matched in the order given.
    pub fn new(rules: Vec<SizeRule>, fallback: SizeBound) -> Self {
        Self { rules, fallback }
    }

    pub fn rules(&self) -> &[SizeRule] {
        &self.rules
    }

    pub fn fallback(&self) -> SizeBound {
        self.fallback
    }

    /// Reject empty keywords (they would match every key) and non-positive bounds.
    pub fn validate(&self) -> Result<(), ReportError> {
        for rule in &self.rules {
            if rule.keyword.trim().is_empty() {
                return Err(ReportError::InvalidConfig(
                    "Size rule keyword must not be empty".into(),
                ));
            }
            check_bound(&rule.bound, &rule.keyword)?;
        }
        check_bound(&self.fallback, "fallback")
    }
}

fn check_bound(bound: &SizeBound, label: &str) -> Result<(), ReportError> {
    let ok = |v: f64| v.is_finite() && v > 0.0;
    if ok(bound.max_width_mm) && ok(bound.max_height_mm) {
        Ok(())
    } else {
        Err(ReportError::InvalidConfig(format!(
            "Size rule '{label}' needs positive bounds, got {}×{} mm",
            bound.max_width_mm, bound.max_height_mm
        )))
    }
}

/// Bound for the first rule whose keyword occurs in `key` (case-insensitive).
///
/// An absent or empty key, or one that matches nothing, yields the fallback.
pub fn resolve_bound(key: Option<&str>, rules: &SizeRules) -> SizeBound {
    let key = key.unwrap_or("").to_lowercase();
    if key.is_empty() {
        return rules.fallback;
    }
    rules
        .rules
        .iter()
        .find(|r| key.contains(&r.keyword.to_lowercase()))
        .map(|r| r.bound)
        .unwrap_or(rules.fallback)
}
