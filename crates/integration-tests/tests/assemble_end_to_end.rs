//! Integration tests for assembling consolidated products from artifacts.
//!
//! Each test lays out the exports an export run would leave in the output
//! directory, assembles them with the default plan, and reads the
//! consolidated document back from disk.

#![allow(clippy::unwrap_used)]

use serde_json::{Value, json};

use product_porter_core::{ConsolidatedEntity, ExportRecord};
use product_porter_integration_tests::{Workspace, collection, metafield, product, variant};
use product_porter_pipeline::ArtifactError;
use product_porter_pipeline::join::{
    BASE_ARTIFACT, COLLECTIONS_ARTIFACT, JoinError, JoinPlan, JoinStep, METAFIELDS_ARTIFACT,
    OUTPUT_ARTIFACT, VARIANTS_ARTIFACT, assemble,
};

fn base() -> Vec<ExportRecord> {
    vec![
        ExportRecord::new(product(1))
            .with_field("title", "LC-LC Patch Cord")
            .with_field("handle", "lc-lc-patch-cord")
            .with_field("options", json!([{"name": "Length", "values": ["1m", "3m"]}])),
        ExportRecord::new("gid://shopify/ProductImage/10")
            .with_parent(product(1))
            .with_field("url", "https://cdn/lc.jpg"),
        ExportRecord::new(product(2))
            .with_field("title", "SFP+ Module")
            .with_field("handle", "sfp-module"),
    ]
}

fn metafield_row(id: u32, owner: &str, namespace: &str, key: &str, value: &str) -> ExportRecord {
    ExportRecord::new(metafield(id))
        .with_parent(owner)
        .with_field("namespace", namespace)
        .with_field("key", key)
        .with_field("type", "multi_line_text_field")
        .with_field("value", value)
}

/// A complete output directory for two products.
fn staged() -> Workspace {
    let ws = Workspace::new();
    ws.save_records(BASE_ARTIFACT, &base());
    ws.save_records(
        VARIANTS_ARTIFACT,
        &[
            ExportRecord::new(variant(2))
                .with_parent(product(1))
                .with_field("sku", "LC-3M")
                .with_field("price", "12.00")
                .with_field(
                    "selectedOptions",
                    json!([{"name": "Length", "value": "3m"}]),
                ),
            ExportRecord::new(variant(1))
                .with_parent(product(1))
                .with_field("sku", "LC-1M")
                .with_field("price", "9.50"),
        ],
    );
    ws.save_records(
        COLLECTIONS_ARTIFACT,
        &[ExportRecord::new(collection(1))
            .with_parent(product(1))
            .with_field("title", "Fiber Optics")],
    );
    ws.save_records(
        METAFIELDS_ARTIFACT,
        &[
            metafield_row(1, &product(1), "content", "spec", "Single-mode, 3mm jacket"),
            metafield_row(2, &product(1), "theme", "shipping_time", "2-3 days"),
            metafield_row(3, &product(1), "custom", "internal_note", "keep"),
        ],
    );
    ws.save(
        "bulk_products_translations_zhTW.json",
        &json!([{
            "resourceId": product(1),
            "translations": [
                {"key": "title", "value": "光纖跳線", "locale": "zh-TW"},
                {"key": "body_html", "value": null, "locale": "zh-TW"}
            ]
        }]),
    );
    ws.save(
        "bulk_products_translations_ja.json",
        &json!([{"resourceId": product(2), "key": "title", "value": "SFPモジュール", "locale": "ja"}]),
    );
    ws.save(
        "metafield_translations_zhTW.json",
        &json!({
            metafield(1): "單模光纖",
            metafield(3): "ignored",
            "gid://shopify/Metafield/999": "orphan"
        }),
    );
    ws
}

fn output(ws: &Workspace) -> Vec<ConsolidatedEntity> {
    ws.load(OUTPUT_ARTIFACT)
}

// =============================================================================
// Full Assembly Tests
// =============================================================================

#[test]
fn test_full_assembly_one_entity_per_product() {
    let ws = staged();

    let summary = assemble(ws.store(), &JoinPlan::default()).unwrap();

    assert_eq!(summary.entities, 2);
    assert_eq!(summary.output, ws.path().join(OUTPUT_ARTIFACT));
    let ids: Vec<_> = output(&ws).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![product(1), product(2)]);
}

#[test]
fn test_full_assembly_first_product() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let entities = output(&ws);
    let patch_cord = &entities[0];

    assert_eq!(patch_cord.str_field("title"), Some("LC-LC Patch Cord"));
    assert_eq!(patch_cord.collections, vec!["Fiber Optics"]);
    assert_eq!(patch_cord.images, vec!["https://cdn/lc.jpg"]);

    let skus: Vec<_> = patch_cord.variants.iter().map(|v| v.sku_key()).collect();
    assert_eq!(skus, vec!["LC-1M", "LC-3M"]);
    assert_eq!(patch_cord.variants[1].price, Some(json!("12.00")));

    assert_eq!(patch_cord.translation("zh-TW", "title"), Some("光纖跳線"));
    assert_eq!(patch_cord.translation("zh-TW", "body_html"), Some(""));
}

#[test]
fn test_full_assembly_metafield_translations() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let entities = output(&ws);
    let metafields = &entities[0].metafields;

    let spec = &metafields["content.spec"];
    assert_eq!(spec.value, json!("Single-mode, 3mm jacket"));
    assert_eq!(spec.i18n.as_ref().unwrap()["zh-TW"], "單模光纖");

    assert!(metafields["theme.shipping_time"].i18n.is_none());
    assert!(metafields["custom.internal_note"].i18n.is_none());
}

#[test]
fn test_full_assembly_second_product_only_translated() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let sfp = &output(&ws)[1];
    assert!(sfp.variants.is_empty());
    assert!(sfp.collections.is_empty());
    assert!(sfp.metafields.is_empty());
    assert_eq!(sfp.translation("ja", "title"), Some("SFPモジュール"));
    assert!(sfp.i18n["zh-TW"].is_empty());
    assert!(sfp.i18n["en"].is_empty());
}

#[test]
fn test_output_document_shape() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let raw: Value = ws.load(OUTPUT_ARTIFACT);
    let first = &raw[0];
    assert!(first.get("options").is_none());
    assert_eq!(first["handle"], json!("lc-lc-patch-cord"));
    assert_eq!(first["metafields"]["content.spec"]["type"], json!("multi_line_text_field"));
    assert_eq!(
        first["variants"][1]["selectedOptions"],
        json!([{"name": "Length", "value": "3m"}])
    );
}

#[test]
fn test_output_keeps_locale_and_metafield_order() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let raw: Value = ws.load(OUTPUT_ARTIFACT);
    let keys = |value: &Value| -> Vec<String> {
        value.as_object().unwrap().keys().cloned().collect()
    };

    assert_eq!(keys(&raw[0]["i18n"]), vec!["zh-TW", "ja", "en"]);
    assert_eq!(
        keys(&raw[0]["metafields"]),
        vec!["content.spec", "theme.shipping_time", "custom.internal_note"]
    );
    assert_eq!(keys(&raw[0])[..2], ["id", "title"]);
}

// =============================================================================
// Missing Artifact Tests
// =============================================================================

#[test]
fn test_base_only_still_assembles() {
    let ws = Workspace::new();
    ws.save_records(BASE_ARTIFACT, &base());

    let summary = assemble(ws.store(), &JoinPlan::default()).unwrap();

    assert_eq!(summary.entities, 2);
    let entities = output(&ws);
    assert!(entities.iter().all(|e| e.variants.is_empty() && e.metafields.is_empty()));
}

#[test]
fn test_missing_base_is_an_error() {
    let ws = staged();
    std::fs::remove_file(ws.path().join(BASE_ARTIFACT)).unwrap();

    let err = assemble(ws.store(), &JoinPlan::default()).unwrap_err();

    assert!(matches!(err, JoinError::MissingBase(name) if name == BASE_ARTIFACT));
    assert!(!ws.exists(OUTPUT_ARTIFACT));
}

#[test]
fn test_unparseable_child_skips_its_step() {
    let ws = staged();
    ws.write_text(VARIANTS_ARTIFACT, "{ truncated");

    let summary = assemble(ws.store(), &JoinPlan::default()).unwrap();

    assert_eq!(summary.entities, 2);
    let entities = output(&ws);
    assert!(entities[0].variants.is_empty());
    assert_eq!(entities[0].collections, vec!["Fiber Optics"]);
    assert_eq!(entities[0].translation("zh-TW", "title"), Some("光纖跳線"));
}

#[test]
fn test_unparseable_base_is_an_error() {
    let ws = staged();
    ws.write_text(BASE_ARTIFACT, "[{\"id\":");

    let err = assemble(ws.store(), &JoinPlan::default()).unwrap_err();

    assert!(matches!(
        err,
        JoinError::Artifact(ArtifactError::Parse { .. })
    ));
    assert!(!ws.exists(OUTPUT_ARTIFACT));
}

#[test]
fn test_unparseable_translation_candidate_falls_through() {
    let ws = staged();
    ws.save(
        "bulk_products_translations_zh-TW.json",
        &json!({"resourceId": product(1), "key": "title", "value": "not a list"}),
    );

    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let entities = output(&ws);
    assert_eq!(entities[0].translation("zh-TW", "title"), Some("光纖跳線"));
}

#[test]
fn test_first_translation_candidate_wins() {
    let ws = staged();
    ws.save(
        "bulk_products_translations_zh-TW.json",
        &json!([{"resourceId": product(1), "key": "title", "value": "優先", "locale": "zh-TW"}]),
    );

    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let entities = output(&ws);
    assert_eq!(entities[0].translation("zh-TW", "title"), Some("優先"));
    assert_eq!(entities[0].translation("zh-TW", "body_html"), None);
}

// =============================================================================
// Join Invariant Tests
// =============================================================================

#[test]
fn test_orphan_rows_are_dropped() {
    let ws = staged();
    let orphan = product(404);
    ws.save_records(
        VARIANTS_ARTIFACT,
        &[ExportRecord::new(variant(9)).with_parent(&*orphan).with_field("sku", "GHOST")],
    );
    ws.save_records(
        COLLECTIONS_ARTIFACT,
        &[ExportRecord::new(collection(9)).with_parent(&*orphan).with_field("title", "Ghost")],
    );

    assemble(ws.store(), &JoinPlan::default()).unwrap();

    let entities = output(&ws);
    assert_eq!(entities.len(), 2);
    assert!(entities.iter().all(|e| e.variants.is_empty()));
    assert!(entities.iter().all(|e| e.collections.is_empty()));
}

#[test]
fn test_repeated_steps_are_idempotent() {
    let ws = staged();
    assemble(ws.store(), &JoinPlan::default()).unwrap();
    let once = output(&ws);

    let mut doubled = JoinPlan::default();
    let steps = doubled.steps.clone();
    doubled.steps.extend(steps);
    assemble(ws.store(), &doubled).unwrap();

    assert_eq!(output(&ws), once);
}

#[test]
fn test_custom_plan_runs_only_its_steps() {
    let ws = staged();
    let plan = JoinPlan {
        steps: vec![JoinStep::Variants],
        output: "variants_only.json".to_string(),
    };

    let summary = assemble(ws.store(), &plan).unwrap();

    assert_eq!(summary.output, ws.path().join("variants_only.json"));
    let entities: Vec<ConsolidatedEntity> = ws.load("variants_only.json");
    assert_eq!(entities[0].variants.len(), 2);
    assert!(entities[0].collections.is_empty());
    assert!(entities[0].images.is_empty());
    assert!(!ws.exists(OUTPUT_ARTIFACT));
}
