//! Integration tests for the guard engine
//!
//! Each test lays out artifacts in a temporary root and runs a built-in (or
//! ad-hoc) guard end to end through the runner.

use std::path::Path;
use std::sync::Arc;

use atlas_guard_core::{
    ArtifactSpec, CheckSpec, Configuration, ContractRegistry, EnforcementMode, EnvFaults,
    FixedClock, GuardCatalog, GuardError, GuardExit, GuardRunner, GuardSpec, ScriptedFaults,
    Verdict, VerdictSink,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write_json(root: &Path, relative: &str, value: Value) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn write_text(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

async fn run(config: Configuration, guard: &str) -> Verdict {
    let catalog = GuardCatalog::builtin();
    GuardRunner::new(config)
        .run(catalog.get(guard).unwrap())
        .await
        .unwrap()
}

fn config_for(dir: &TempDir) -> Configuration {
    Configuration::default().with_root(dir.path())
}

fn chips(root: &Path, chips: &[&str], applied: &[&str]) {
    let items: Vec<Value> = chips.iter().map(|id| json!({"id": id})).collect();
    write_json(root, "share/atlas/filter_chips.json", json!({"items": items}));
    let items: Vec<Value> = applied.iter().map(|id| json!({"chip_id": id})).collect();
    write_json(root, "share/atlas/filter_apply.json", json!({"items": items}));
}

#[tokio::test]
async fn test_chip_drift_reports_missing_chip() {
    let dir = TempDir::new().unwrap();
    chips(dir.path(), &["chip:a", "chip:b"], &["chip:a"]);

    let verdict = run(config_for(&dir), "chip_propagation").await;

    assert!(!verdict.ok);
    assert_eq!(verdict.checks["chip_apply_drift"], false);
    assert_eq!(verdict.details["chip_apply_drift"]["missing"], json!(["chip:b"]));
    assert_eq!(verdict.checks["applied_chips_known"], true);
    assert_eq!(verdict.counts["chip_apply_drift_missing_count"], 1);
    assert_eq!(verdict.counts["applied_chips_known_missing_count"], 0);
    assert_eq!(verdict.counts["extra_count"], 0);
    assert!(!verdict.counts.contains_key("missing_count"));
    assert!(verdict.is_consistent());
}

#[tokio::test]
async fn test_chip_identical_sets_pass() {
    let dir = TempDir::new().unwrap();
    chips(dir.path(), &["chip:a", "chip:b"], &["chip:b", "chip:a"]);

    let verdict = run(config_for(&dir), "chip_propagation").await;

    assert!(verdict.ok);
    assert_eq!(verdict.checks["chip_apply_drift"], true);
    assert!(!verdict.forced);
    assert_eq!(verdict.details["chip_apply_drift"]["forced"], json!(false));
}

#[tokio::test]
async fn test_forced_drift_fails_healthy_input() {
    let dir = TempDir::new().unwrap();
    chips(dir.path(), &["chip:a"], &["chip:a"]);
    let config = config_for(&dir).with_var("CHIP_PROPAGATION_FORCE", "chip:ghost");

    let faults = EnvFaults::from_config(&config, "chip_propagation");
    let catalog = GuardCatalog::builtin();
    let verdict = GuardRunner::new(config)
        .with_faults(Arc::new(faults))
        .run(catalog.get("chip_propagation").unwrap())
        .await
        .unwrap();

    assert!(!verdict.ok);
    assert!(verdict.forced);
    assert_eq!(verdict.details["chip_apply_drift"]["forced"], json!(true));
    assert_eq!(verdict.details["chip_apply_drift"]["injected"], json!("chip:ghost"));
}

#[tokio::test]
async fn test_receipt_scenario() {
    let dir = TempDir::new().unwrap();
    write_json(dir.path(), "evidence/tv_receipt.json", json!({"ok": true, "pytest_exit_code": 0}));

    let verdict = run(config_for(&dir), "tv_receipt").await;

    let checks: Vec<(&str, bool)> = verdict.checks.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(
        checks,
        vec![
            ("receipt_exists", true),
            ("receipt_json_valid", true),
            ("tv_suite_ok", true),
            ("pytest_exit_zero", true),
        ]
    );
    assert!(verdict.ok);
    assert_eq!(verdict.mode, EnforcementMode::Hint);
}

#[tokio::test]
async fn test_missing_artifact_is_never_omitted() {
    let dir = TempDir::new().unwrap();

    let verdict = run(config_for(&dir), "tv_receipt").await;

    assert!(!verdict.ok);
    assert_eq!(verdict.checks["receipt_exists"], false);
    assert_eq!(verdict.checks["receipt_json_valid"], false);
    assert_eq!(verdict.details["receipt_exists"]["reason"], json!("missing"));
    assert_eq!(verdict.checks["tv_suite_ok"], false);
    assert_eq!(verdict.details["tv_suite_ok"]["reason"], json!("missing"));
    assert_eq!(verdict.checks.len(), 4);
}

#[tokio::test]
async fn test_malformed_artifact_is_distinct_from_missing() {
    let dir = TempDir::new().unwrap();
    write_text(dir.path(), "evidence/tv_receipt.json", "{\"ok\": tru");

    let verdict = run(config_for(&dir), "tv_receipt").await;

    assert_eq!(verdict.checks["receipt_exists"], true);
    assert_eq!(verdict.checks["receipt_json_valid"], false);
    assert_eq!(verdict.details["receipt_json_valid"]["reason"], json!("invalid_json"));
    assert!(!verdict.ok);
}

#[tokio::test]
async fn test_missing_tooling_is_a_skip() {
    let dir = TempDir::new().unwrap();
    write_json(dir.path(), "evidence/tv_receipt.json", json!({"ok": true, "pytest_exit_code": 127}));

    let verdict = run(config_for(&dir).with_mode(EnforcementMode::Strict), "tv_receipt").await;

    assert!(verdict.ok);
    assert_eq!(verdict.skipped, vec!["pytest_exit_zero".to_string()]);
    assert_eq!(verdict.mode, EnforcementMode::Strict);
    assert_eq!(verdict.mode.exit_for(&verdict), GuardExit::Pass);
}

#[tokio::test]
async fn test_hint_and_strict_differ_only_in_exit() {
    let dir = TempDir::new().unwrap();

    let hint = run(config_for(&dir), "tv_receipt").await;
    let strict = run(config_for(&dir).with_var("STRICT_TV_RECEIPT", "1"), "tv_receipt").await;

    assert_eq!(hint.checks, strict.checks);
    assert_eq!(hint.mode.exit_for(&hint), GuardExit::Pass);
    assert_eq!(strict.mode, EnforcementMode::Strict);
    assert_eq!(strict.mode.exit_for(&strict), GuardExit::Failed);
}

#[tokio::test]
async fn test_idempotent_runs_differ_only_in_timestamp() {
    let dir = TempDir::new().unwrap();
    chips(dir.path(), &["chip:a", "chip:b", "chip:b"], &["chip:a"]);

    let first = run(config_for(&dir), "chip_propagation").await;
    let second = run(config_for(&dir), "chip_propagation").await;

    assert_eq!(first.without_timestamp(), second.without_timestamp());
    assert_eq!(
        serde_json::to_string(&first.without_timestamp()).unwrap(),
        serde_json::to_string(&second.without_timestamp()).unwrap()
    );
}

#[tokio::test]
async fn test_graph_rollup_staleness() {
    let dir = TempDir::new().unwrap();
    write_json(
        dir.path(),
        "share/atlas/graph_rollup.json",
        json!({
            "schema": {"id": "atlas.graph.rollup.v2", "version": 2},
            "generated_at": "2026-05-01T00:00:00Z",
            "nodes": [{"id": "n1"}, {"id": "n2"}]
        }),
    );
    let catalog = GuardCatalog::builtin();
    let guard = catalog.get("graph_rollup").unwrap();

    let fresh = GuardRunner::new(config_for(&dir)).run(guard).await.unwrap();
    assert!(fresh.ok, "{:?}", fresh.details);

    let later = FixedClock(Utc::now() + Duration::seconds(3_600));
    let config = config_for(&dir).with_var("GRAPH_ROLLUP_STALE_THRESHOLD_SECONDS", "60");
    let stale = GuardRunner::new(config)
        .with_clock(Arc::new(later))
        .run(guard)
        .await
        .unwrap();
    assert_eq!(stale.checks["graph_rollup_fresh"], false);
    assert_eq!(stale.details["graph_rollup_fresh"]["forced"], json!(false));
    assert_eq!(stale.details["graph_rollup_fresh"]["threshold_seconds"], json!(60));

    let forced = GuardRunner::new(config_for(&dir))
        .with_faults(Arc::new(ScriptedFaults::new().force_stale("graph_rollup_fresh")))
        .run(guard)
        .await
        .unwrap();
    assert!(!forced.ok);
    assert!(forced.forced);
}

#[tokio::test]
async fn test_graph_rollup_bad_schema() {
    let dir = TempDir::new().unwrap();
    write_json(
        dir.path(),
        "share/atlas/graph_rollup.json",
        json!({"schema": {"id": "atlas.graph.v1", "version": 1}, "generated_at": "x", "nodes": []}),
    );

    let verdict = run(config_for(&dir), "graph_rollup").await;
    assert_eq!(verdict.checks["graph_rollup_schema"], false);
    assert_eq!(verdict.details["graph_rollup_schema"]["reason"], json!("bad_schema_id"));
}

#[tokio::test]
async fn test_atlas_links() {
    let dir = TempDir::new().unwrap();
    write_text(dir.path(), "share/atlas/pages/genesis.html", "<html/>");
    write_json(
        dir.path(),
        "share/atlas/sitemap.json",
        json!({
            "schema": {"id": "atlas.sitemap.v1", "version": 1},
            "pages": [
                {"id": "index", "links": ["pages/genesis.html", "/atlas/abs.html", "https://example.org"]},
                {"id": "genesis", "links": ["pages/exodus.html#top"]}
            ]
        }),
    );

    let broken = run(config_for(&dir), "atlas_links").await;
    assert_eq!(broken.checks["page_links_resolve"], false);
    assert_eq!(broken.details["page_links_resolve"]["broken"], json!(["pages/exodus.html#top"]));
    assert_eq!(broken.details["page_links_resolve"]["absolute"], json!(["/atlas/abs.html"]));
    assert_eq!(broken.counts["broken_count"], 1);

    let config = config_for(&dir).with_var("ATLAS_LINKS_WHITELIST", "pages/exodus.html");
    let whitelisted = run(config, "atlas_links").await;
    assert!(whitelisted.ok, "{:?}", whitelisted.details);
    assert_eq!(
        whitelisted.details["page_links_resolve"]["whitelisted"],
        json!(["pages/exodus.html#top"])
    );
}

#[tokio::test]
async fn test_atlas_backlinks_markers() {
    let dir = TempDir::new().unwrap();
    write_text(
        dir.path(),
        "docs/atlas/index.html",
        "<nav class=\"atlas-backlinks\"><a href=\"../index.html\">Back to Atlas</a></nav>",
    );

    let verdict = run(config_for(&dir), "atlas_backlinks").await;
    assert!(verdict.ok);
    assert!(!verdict.checks.contains_key("atlas_index_json_valid"));

    let config = config_for(&dir).with_var("ATLAS_BACKLINKS_MARKERS", "atlas-backlinks,data-node-id");
    let verdict = run(config, "atlas_backlinks").await;
    assert!(!verdict.ok);
    assert_eq!(verdict.details["backlink_markers"]["markers_missing"], json!(["data-node-id"]));

    write_text(dir.path(), "docs/atlas/index.html", "<html>no backlinks</html>");
    let config = config_for(&dir).with_var("ATLAS_BACKLINKS_MARKERS", "");
    let verdict = run(config, "atlas_backlinks").await;
    assert_eq!(verdict.checks["backlink_markers"], false);
    assert_eq!(
        verdict.details["backlink_markers"]["markers_missing"],
        json!(["atlas-backlinks", "Back to Atlas"])
    );
}

#[tokio::test]
async fn test_atlas_links_rejects_non_string_entries() {
    let dir = TempDir::new().unwrap();
    write_json(
        dir.path(),
        "share/atlas/sitemap.json",
        json!({
            "schema": {"id": "atlas.sitemap.v1", "version": 1},
            "pages": [{"id": "index", "links": [{"href": "pages/missing.html"}]}]
        }),
    );

    let verdict = run(config_for(&dir), "atlas_links").await;
    assert_eq!(verdict.checks["page_links_resolve"], false);
    let error = verdict.details["page_links_resolve"]["error"].as_str().unwrap();
    assert!(error.contains("/pages/0/links/0"), "{}", error);
}

fn search_eval(root: &Path, queries: usize, gap: f64) {
    let queries: Vec<Value> = (0..queries).map(|i| json!({"q": format!("query {}", i)})).collect();
    write_json(
        root,
        "share/eval/search_eval.json",
        json!({
            "schema": {"id": "gemantria.search_eval.v1", "version": 1},
            "queries": queries,
            "rerank": {"max_gap": gap}
        }),
    );
}

#[tokio::test]
async fn test_search_eval_thresholds() {
    let dir = TempDir::new().unwrap();
    search_eval(dir.path(), 12, 0.31);

    let verdict = run(config_for(&dir), "search_eval").await;
    assert!(verdict.ok, "{:?}", verdict.details);
    assert_eq!(verdict.details["query_count"]["measured"], json!(12.0));
    assert_eq!(verdict.details["query_count"]["threshold"], json!(10.0));

    let config = config_for(&dir)
        .with_var("SEARCH_EVAL_MIN_QUERIES", "20")
        .with_var("SEARCH_EVAL_MAX_RERANK_GAP", "0.25");
    let verdict = run(config, "search_eval").await;
    assert_eq!(verdict.checks["query_count"], false);
    assert_eq!(verdict.checks["rerank_gap"], false);
    assert_eq!(verdict.details["rerank_gap"]["threshold"], json!(0.25));
}

#[tokio::test]
async fn test_search_eval_forced_threshold() {
    let dir = TempDir::new().unwrap();
    search_eval(dir.path(), 12, 0.31);

    let verdict = GuardRunner::new(config_for(&dir))
        .with_faults(Arc::new(ScriptedFaults::new().override_threshold("query_count", 1_000_000.0)))
        .run(GuardCatalog::builtin().get("search_eval").unwrap())
        .await
        .unwrap();

    assert!(!verdict.ok);
    assert!(verdict.forced);
    assert_eq!(verdict.details["query_count"]["threshold"], json!(1_000_000.0));
    assert_eq!(verdict.details["rerank_gap"]["forced"], json!(false));
}

#[tokio::test]
async fn test_env_threshold_injection_fails_every_forced_check() {
    let dir = TempDir::new().unwrap();
    search_eval(dir.path(), 12, 0.0);

    for injected in ["0", "1000"] {
        let config = config_for(&dir).with_var("SEARCH_EVAL_FORCE_THRESHOLD", injected);
        let faults = EnvFaults::from_config(&config, "search_eval");
        let verdict = GuardRunner::new(config)
            .with_faults(Arc::new(faults))
            .run(GuardCatalog::builtin().get("search_eval").unwrap())
            .await
            .unwrap();

        assert!(!verdict.ok, "FORCE_THRESHOLD={} passed", injected);
        assert!(verdict.forced);
        for check in ["query_count", "rerank_gap"] {
            assert_eq!(verdict.details[check]["forced"], json!(true));
            assert_eq!(verdict.checks[check], false, "{} passed with {}", check, injected);
        }
    }
}

#[tokio::test]
async fn test_missing_contract_aborts_without_verdict() {
    let dir = TempDir::new().unwrap();
    let guard = GuardSpec::new("verse_index", "")
        .artifact(ArtifactSpec::json("verse_index", "verse_index.json"))
        .check(
            "verse_index_schema",
            CheckSpec::Schema {
                artifact: "verse_index".to_string(),
            },
        );

    let err = GuardRunner::new(config_for(&dir))
        .with_contracts(ContractRegistry::builtin())
        .run(&guard)
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::ContractMissing(_)));
    assert!(err.is_usage_error());
}

#[tokio::test]
async fn test_artifact_path_override_and_sink() {
    let dir = TempDir::new().unwrap();
    write_json(dir.path(), "elsewhere/receipt.json", json!({"ok": false, "pytest_exit_code": 1}));
    let config = config_for(&dir).with_var("TV_RECEIPT_RECEIPT_PATH", "elsewhere/receipt.json");

    let verdict = run(config.clone(), "tv_receipt").await;
    assert_eq!(verdict.checks["receipt_exists"], true);
    assert_eq!(verdict.checks["tv_suite_ok"], false);
    assert_eq!(verdict.checks["pytest_exit_zero"], false);

    let sink = VerdictSink::for_guard(&config, "tv_receipt");
    let mut out = Vec::new();
    sink.print(&verdict, &mut out).unwrap();
    sink.persist(&verdict).unwrap();
    assert!(dir.path().join("evidence/tv_receipt.verdict.json").exists());
    assert_eq!(Verdict::from_file(sink.path()).unwrap(), verdict);
}
