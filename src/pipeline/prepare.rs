//! Context preparation: derived and normalised fields added before the
//! image pass.
//!
//! Works on a copy of the report. The original fields are kept; derived
//! ones are added next to them:
//!
//! - `metadonnees.historique_revisions[*].date` → `dd/mm/yyyy`
//! - `metadonnees.main_image_exists`, `metadonnees.client_logo_exists`
//! - `analyse_synthese.taux_reussite_pct`

use crate::config::RenderConfig;
use crate::report::keys;
use crate::store::FileStore;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

static RE_CANONICAL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());

const CANONICAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Reformat a date string as `dd/mm/yyyy`.
///
/// Accepts ISO dates (`2024-03-15`), ISO date-times with or without
/// fractional seconds, and RFC 3339. Canonical and unparseable input is
/// returned unchanged.
pub fn format_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if RE_CANONICAL_DATE.is_match(s) {
        return s.to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.format(CANONICAL_DATE_FORMAT).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.date_naive().format(CANONICAL_DATE_FORMAT).to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return dt.date().format(CANONICAL_DATE_FORMAT).to_string();
        }
    }
    debug!("Unrecognised date left as is: {:?}", raw);
    raw.to_string()
}

/// `successes / total × 100`, rounded to one decimal. Zero runs give 0.
pub fn success_rate_pct(simulations: &[Value], config: &RenderConfig) -> f64 {
    if simulations.is_empty() {
        return 0.0;
    }
    let successes = simulations
        .iter()
        .filter(|sim| {
            sim.get(keys::OUTCOME)
                .and_then(Value::as_str)
                .is_some_and(|o| config.is_success_outcome(o))
        })
        .count();
    let pct = successes as f64 / simulations.len() as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Adds derived fields to a copy of the report.
pub struct ContextPreparer<'a> {
    store: &'a dyn FileStore,
    config: &'a RenderConfig,
}

impl<'a> ContextPreparer<'a> {
    pub fn new(store: &'a dyn FileStore, config: &'a RenderConfig) -> Self {
        Self { store, config }
    }

    /// Prepared copy of `report`; the caller's value is left untouched.
    pub fn prepare(&self, report: &Value) -> Value {
        let mut context = report.clone();

        if let Some(meta) = context
            .get_mut(keys::METADATA)
            .and_then(Value::as_object_mut)
        {
            for key in [keys::MAIN_IMAGE, keys::CLIENT_LOGO] {
                let exists = meta
                    .get(key)
                    .and_then(Value::as_str)
                    .is_some_and(|p| !p.is_empty() && self.store.exists(p));
                meta.insert(format!("{key}_exists"), Value::Bool(exists));
            }

            if let Some(revisions) = meta
                .get_mut(keys::REVISIONS)
                .and_then(Value::as_array_mut)
            {
                for revision in revisions {
                    if let Some(Value::String(date)) = revision.get_mut(keys::REVISION_DATE) {
                        *date = format_date(date);
                    }
                }
            }
        }

        let rate = context
            .get(keys::SIMULATIONS)
            .and_then(|s| s.get(keys::SIMULATIONS))
            .and_then(Value::as_array)
            .map(|sims| success_rate_pct(sims, self.config));

        if let (Some(rate), Some(analysis)) = (
            rate,
            context
                .get_mut(keys::ANALYSIS)
                .and_then(Value::as_object_mut),
        ) {
            debug!("Success rate: {:.1}%", rate);
            analysis.insert(keys::SUCCESS_RATE_PCT.to_string(), json!(rate));
        }

        context
    }
}
