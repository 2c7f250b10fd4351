//! Integration tests for manoeuvre-report.
//!
//! Every test builds a throwaway upload directory with real PNG/JPEG files
//! written by the `image` crate, then runs the public entry points against
//! it through a `LocalFileStore` rooted at that directory.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use image::{Rgb, RgbImage};
use manoeuvre_report::{
    export_json, generate_report, render_context, ContextValue, DocumentHandle, FileStore,
    ImageEncoding, JsonContextEngine, LocalFileStore, RenderConfig, RenderOutput, ReportError,
    SizeRule, SizeRules, TemplateEngine,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs to the test harness; `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `<tmp>/uploads/` with a ship photo, a client logo and a corrupt file.
fn upload_dir() -> TempDir {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    RgbImage::from_pixel(1600, 1200, Rgb([30, 60, 120]))
        .save(uploads.join("ship1.jpg"))
        .unwrap();
    RgbImage::from_pixel(400, 400, Rgb([250, 250, 250]))
        .save(uploads.join("logo.png"))
        .unwrap();
    std::fs::write(uploads.join("broken.png"), b"this is not a png").unwrap();
    dir
}

fn store(dir: &Path) -> Arc<dyn FileStore> {
    Arc::new(LocalFileStore::with_base_dir(dir))
}

fn study_report() -> Value {
    json!({
        "metadonnees": {
            "titre": "Étude de manœuvrabilité – Terminal Est",
            "client": "Port autonome",
            "client_logo": "uploads/logo.png",
            "historique_revisions": [{"version": "A", "date": "2024-03-15"}]
        },
        "donnees_navires": {
            "navires": {"navires": [{"nom": "PC 366", "figure": "uploads/ship1.jpg"}]}
        },
        "simulations": {"simulations": [
            {"id": 1, "resultat": "success", "planche": "uploads/ghost.png"},
            {"id": 2, "resultat": "success"},
            {"id": 3, "resultat": "Échec", "planche": "uploads/broken.png"},
            {"id": 4, "resultat": "Réussite"}
        ]},
        "analyse_synthese": {"commentaire": "RAS"}
    })
}

fn assert_mm(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= 0.1,
        "[{what}] expected {expected} mm, got {actual} mm"
    );
}

// ── Image sizing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn ship_figure_is_fitted_to_figure_bound() {
    let dir = upload_dir();
    let doc = DocumentHandle::open("report_template.docx");
    let report = json!({"navire": {"figure": "uploads/ship1.jpg"}});

    let out = render_context(&report, &doc, store(dir.path()), &RenderConfig::default()).await;

    let img = out
        .context
        .get("navire")
        .and_then(|n| n.get("figure"))
        .and_then(ContextValue::as_image)
        .expect("figure should be embedded");
    assert_mm(img.width_mm(), 120.0, "width");
    assert_mm(img.height_mm(), 90.0, "height");
    assert_eq!(img.pixel_size(), (1600, 1200));
    assert_eq!(img.mime_type(), "image/jpeg");
    assert!(doc.owns(img));
}

#[tokio::test]
async fn client_logo_gets_the_small_bound() {
    let dir = upload_dir();
    let doc = DocumentHandle::open("t.docx");
    let out = render_context(&study_report(), &doc, store(dir.path()), &RenderConfig::default()).await;

    let logo = out
        .context
        .get("metadonnees")
        .and_then(|m| m.get("client_logo"))
        .and_then(ContextValue::as_image)
        .expect("logo should be embedded");
    assert_mm(logo.width_mm(), 25.0, "logo width");
    assert_mm(logo.height_mm(), 25.0, "logo height");
}

#[tokio::test]
async fn reordered_rules_change_the_logo_size() {
    let dir = upload_dir();
    let rules = SizeRules::new(
        vec![
            SizeRule::new("logo", 30.0, 30.0),
            SizeRule::new("client_logo", 25.0, 25.0),
        ],
        SizeRules::default().fallback(),
    );
    let config = RenderConfig::builder().size_rules(rules).build().unwrap();
    let doc = DocumentHandle::open("t.docx");
    let report = json!({"client_logo": "uploads/logo.png"});

    let out = render_context(&report, &doc, store(dir.path()), &config).await;
    let logo = out.context.get("client_logo").and_then(ContextValue::as_image).unwrap();
    assert_mm(logo.width_mm(), 30.0, "logo width");
}

// ── Missing vs. unreadable ───────────────────────────────────────────────────

#[tokio::test]
async fn missing_path_is_kept_and_broken_file_gets_diagnostic() {
    let dir = upload_dir();
    let doc = DocumentHandle::open("t.docx");
    let out = render_context(&study_report(), &doc, store(dir.path()), &RenderConfig::default()).await;

    let sims = out
        .context
        .get("simulations")
        .and_then(|s| s.get("simulations"))
        .and_then(ContextValue::as_seq)
        .unwrap();
    assert_eq!(sims.len(), 4);
    assert_eq!(
        sims[0].get("planche").and_then(ContextValue::as_str),
        Some("uploads/ghost.png")
    );
    let diagnostic = sims[2].get("planche").and_then(ContextValue::as_str).unwrap();
    assert!(diagnostic.contains("broken.png"), "got: {diagnostic}");

    assert_eq!(out.stats.images_found, 4);
    assert_eq!(out.stats.images_embedded, 2);
    assert_eq!(out.stats.images_missing, 1);
    assert_eq!(out.stats.images_failed, 1);
}

// ── Prepared fields ──────────────────────────────────────────────────────────

#[tokio::test]
async fn derived_fields_are_added_next_to_originals() {
    let dir = upload_dir();
    let doc = DocumentHandle::open("t.docx");
    let report = study_report();
    let out = render_context(&report, &doc, store(dir.path()), &RenderConfig::default()).await;
    let ctx = out.context.to_json(ImageEncoding::Descriptor);

    assert_eq!(ctx["analyse_synthese"]["taux_reussite_pct"], json!(75.0));
    assert_eq!(ctx["analyse_synthese"]["commentaire"], "RAS");
    assert_eq!(ctx["metadonnees"]["client_logo_exists"], json!(true));
    assert_eq!(ctx["metadonnees"]["main_image_exists"], json!(false));
    assert_eq!(ctx["metadonnees"]["historique_revisions"][0]["date"], "15/03/2024");

    // The caller's report is untouched.
    assert_eq!(report["metadonnees"]["historique_revisions"][0]["date"], "2024-03-15");
    assert!(report["analyse_synthese"].get("taux_reussite_pct").is_none());
}

#[tokio::test]
async fn every_render_uses_a_fresh_document() {
    let dir = upload_dir();
    let report = json!({"figure": "uploads/ship1.jpg"});
    let first = DocumentHandle::open("t.docx");
    let second = DocumentHandle::open("t.docx");
    let config = RenderConfig::default();

    let a = render_context(&report, &first, store(dir.path()), &config).await;
    let b = render_context(&report, &second, store(dir.path()), &config).await;

    assert_ne!(a.context.document(), b.context.document());
    let engine = JsonContextEngine::default();
    assert!(engine.render(&second, &b.context).is_ok());
    assert!(matches!(
        engine.render(&second, &a.context),
        Err(ReportError::ForeignImage { .. })
    ));
}

#[tokio::test]
async fn image_rewritten_between_renders_is_read_again() {
    let dir = upload_dir();
    let report = json!({"figure": "uploads/ship1.jpg"});
    let config = RenderConfig::default();
    let figure = |out: &RenderOutput| {
        out.context
            .get("figure")
            .and_then(ContextValue::as_image)
            .map(|img| (img.pixel_size(), img.width_mm(), img.height_mm()))
            .expect("figure should be embedded")
    };

    let before = render_context(&report, &DocumentHandle::open("t.docx"), store(dir.path()), &config).await;
    // Portrait now: 300 × 600 px at 96 DPI fits the 120 × 90 bound as 45 × 90 mm.
    RgbImage::from_pixel(300, 600, Rgb([200, 40, 40]))
        .save(dir.path().join("uploads").join("ship1.jpg"))
        .unwrap();
    let after = render_context(&report, &DocumentHandle::open("t.docx"), store(dir.path()), &config).await;

    let (px_before, w_before, _) = figure(&before);
    let (px_after, w_after, h_after) = figure(&after);
    assert_eq!(px_before, (1600, 1200));
    assert_eq!(px_after, (300, 600));
    assert_mm(w_before, 120.0, "first width");
    assert_mm(w_after, 45.0, "second width");
    assert_mm(h_after, 90.0, "second height");
}

// ── Outer surface ────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_report_writes_into_output_dir() {
    let dir = upload_dir();
    let template = dir.path().join("templates").join("report_template.docx");
    std::fs::create_dir_all(template.parent().unwrap()).unwrap();
    std::fs::write(&template, b"PK").unwrap();
    let config = RenderConfig::builder()
        .output_dir(dir.path().join("exports"))
        .build()
        .unwrap();

    let generated = generate_report(
        &study_report(),
        &template,
        &JsonContextEngine::default(),
        store(dir.path()),
        &config,
    )
    .await
    .unwrap();

    assert!(generated.path.exists());
    assert!(generated.path.starts_with(dir.path().join("exports")));
    let written: Value = serde_json::from_slice(&std::fs::read(&generated.path).unwrap()).unwrap();
    let figure = &written["context"]["donnees_navires"]["navires"]["navires"][0]["figure"];
    assert_eq!(figure["image"], "uploads/ship1.jpg");
    assert_eq!(figure["mime_type"], "image/jpeg");
}

#[tokio::test]
async fn generate_report_without_template_fails() {
    let dir = upload_dir();
    let config = RenderConfig::builder().output_dir(dir.path()).build().unwrap();
    let err = generate_report(
        &study_report(),
        dir.path().join("templates/missing.docx"),
        &JsonContextEngine::default(),
        store(dir.path()),
        &config,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ReportError::TemplateNotFound { .. }));
    assert!(!dir.path().join("exports").exists());
}

#[test]
fn export_json_round_trips_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rapport_export.json");
    let report = study_report();

    export_json(&report, &path).unwrap();

    let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back["_metadata"]["version"], "1.0");
    assert_eq!(back["_metadata"]["format"], "manoeuvrability_report");
    assert!(back["_metadata"]["generated_at"].as_str().is_some());
    assert_eq!(back["_structure"]["sections"][0], "metadonnees");
    assert_eq!(back["metadonnees"], report["metadonnees"]);
    assert_eq!(back["simulations"], report["simulations"]);
}
