//! Report record conventions: section keys, required-field validation,
//! summary metrics and export annotation.
//!
//! The report itself stays an untyped [`serde_json::Value`]; the form
//! surface that produces it owns the schema. This module only knows the
//! handful of keys the pipeline reads.

use crate::config::RenderConfig;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Keys of the sections and fields the pipeline reads.
pub mod keys {
    pub const METADATA: &str = "metadonnees";
    pub const INTRODUCTION: &str = "introduction";
    pub const INPUT_DATA: &str = "donnees_entree";
    pub const SHIPS_DATA: &str = "donnees_navires";
    pub const SIMULATIONS: &str = "simulations";
    pub const ANALYSIS: &str = "analyse_synthese";
    pub const SYNTHESIS: &str = "synthese_redigee";
    pub const CONCLUSION: &str = "conclusion";
    pub const RECOMMENDATIONS: &str = "recommandations";

    pub const MAIN_IMAGE: &str = "main_image";
    pub const CLIENT_LOGO: &str = "client_logo";
    pub const REVISIONS: &str = "historique_revisions";
    pub const REVISION_DATE: &str = "date";

    pub const SHIPS: &str = "navires";
    pub const TUGS: &str = "remorqueurs";
    pub const OUTCOME: &str = "resultat";
    pub const SUCCESS_RATE_PCT: &str = "taux_reussite_pct";
}

/// Sections in document order, as recorded in the export's `_structure`.
pub const SECTION_ORDER: &[&str] = &[
    keys::METADATA,
    keys::INTRODUCTION,
    keys::INPUT_DATA,
    keys::SHIPS_DATA,
    keys::SIMULATIONS,
    keys::ANALYSIS,
    keys::CONCLUSION,
    "annexes",
];

const REQUIRED_METADATA: &[&str] = &[
    "titre",
    "projet",
    "code_projet",
    "client",
    "type",
    "numero",
    "annee",
];
const REQUIRED_INTRODUCTION: &[&str] = &["guidelines", "objectifs"];

/// One reason a report is not ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssue {
    /// A required field is absent, null or the empty string.
    MissingField { path: String },
    /// A list that must contain at least one entry is absent or empty.
    EmptyList { path: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { path } => write!(f, "required field '{path}' is empty"),
            ValidationIssue::EmptyList { path } => write!(f, "'{path}' needs at least one entry"),
        }
    }
}

/// Present, not null and not the empty string.
pub fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn lookup<'a>(report: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(report, |v, k| v.get(k))
}

/// Every required field the report is missing. Empty when ready to export.
pub fn validate_report(report: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut require = |path: &[&str]| {
        if !is_filled(lookup(report, path)) {
            issues.push(ValidationIssue::MissingField {
                path: path.join("."),
            });
        }
    };

    for field in REQUIRED_METADATA {
        require(&[keys::METADATA, *field]);
    }
    for field in REQUIRED_INTRODUCTION {
        require(&[keys::INTRODUCTION, *field]);
    }
    require(&[keys::SYNTHESIS]);
    require(&[keys::CONCLUSION]);

    for path in [
        &[keys::SHIPS_DATA, keys::SHIPS, keys::SHIPS][..],
        &[keys::SIMULATIONS, keys::SIMULATIONS][..],
    ] {
        let non_empty = lookup(report, path)
            .and_then(Value::as_array)
            .is_some_and(|a| !a.is_empty());
        if !non_empty {
            issues.push(ValidationIssue::EmptyList {
                path: path.join("."),
            });
        }
    }

    let has_recommendation = report
        .get(keys::RECOMMENDATIONS)
        .and_then(Value::as_array)
        .is_some_and(|a| a.iter().any(|r| is_filled(Some(r))));
    if !has_recommendation {
        issues.push(ValidationIssue::EmptyList {
            path: keys::RECOMMENDATIONS.to_string(),
        });
    }

    issues
}

/// Whether [`validate_report`] finds nothing missing.
pub fn is_valid(report: &Value) -> bool {
    validate_report(report).is_empty()
}

/// Key figures shown before export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub titre: String,
    pub client: String,
    pub projet: String,
    pub nb_navires: usize,
    pub nb_remorqueurs: usize,
    pub nb_simulations: usize,
    /// Fraction of successful simulations, 0–1.
    pub taux_reussite: f64,
}

impl ReportSummary {
    pub fn from_report(report: &Value, config: &RenderConfig) -> Self {
        let text = |field: &str| {
            lookup(report, &[keys::METADATA, field])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let count = |path: &[&str]| {
            lookup(report, path)
                .and_then(Value::as_array)
                .map_or(0, Vec::len)
        };

        let simulations = lookup(report, &[keys::SIMULATIONS, keys::SIMULATIONS])
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let successes = simulations
            .iter()
            .filter(|s| {
                s.get(keys::OUTCOME)
                    .and_then(Value::as_str)
                    .is_some_and(|o| config.is_success_outcome(o))
            })
            .count();
        let taux_reussite = if simulations.is_empty() {
            0.0
        } else {
            successes as f64 / simulations.len() as f64
        };

        Self {
            titre: text("titre"),
            client: text("client"),
            projet: text("projet"),
            nb_navires: count(&[keys::SHIPS_DATA, keys::SHIPS, keys::SHIPS]),
            nb_remorqueurs: count(&[keys::SHIPS_DATA, keys::TUGS, keys::TUGS]),
            nb_simulations: simulations.len(),
            taux_reussite,
        }
    }
}

/// Copy of `report` with generation metadata for the JSON export.
///
/// Adds `_metadata` (timestamp, version, format) and `_structure` (section
/// order), and guarantees `simulations.simulations` is a list whenever
/// `simulations` is a section.
pub fn annotate_for_export(report: &Value) -> Value {
    let mut data = report.clone();
    if let Some(obj) = data.as_object_mut() {
        obj.insert(
            "_metadata".to_string(),
            json!({
                "generated_at": Local::now().to_rfc3339(),
                "version": "1.0",
                "format": "manoeuvrability_report",
            }),
        );
        obj.insert(
            "_structure".to_string(),
            json!({ "sections": SECTION_ORDER }),
        );

        if let Some(sims) = obj
            .get_mut(keys::SIMULATIONS)
            .and_then(Value::as_object_mut)
        {
            sims.entry(keys::SIMULATIONS)
                .or_insert_with(|| Value::Array(Vec::new()));
        }
    }

    data
}
