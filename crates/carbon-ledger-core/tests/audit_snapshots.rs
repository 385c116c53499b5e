use std::{fs, path::PathBuf};

use carbon_ledger_core::audit::{
    audit_source, default_scorer::DefaultScorer, file_source::FileCsvSource, ParseError,
};
use insta::assert_json_snapshot;
use serde_json::json;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

async fn audit_file(path: PathBuf) -> serde_json::Value {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = FileCsvSource::new(&path);
    let report = audit_source(&source, &DefaultScorer::default())
        .await
        .unwrap_or_else(|err| panic!("audit failed for {}: {err:#}", path.display()));

    json!({
        "carbon_debt": report.carbon_debt,
        "estimated_fine": report.estimated_fine,
        "fixture": name,
        "risk_tier": report.risk_tier,
        "suggestions": report.suggestions,
        "total_emissions": report.total_emissions,
        "violations": report.violations.iter().map(|v| json!({
            "affected": v.affected,
            "reason": v.reason,
            "rule": v.rule,
        })).collect::<Vec<_>>(),
    })
}

#[tokio::test(flavor = "current_thread")]
async fn sample_dataset_snapshot() {
    let snapshot = audit_file(workspace_root().join("samples/sample.csv")).await;
    assert_json_snapshot!("sample", snapshot);
}

#[tokio::test(flavor = "current_thread")]
async fn noncompliant_dataset_snapshot() {
    let snapshot = audit_file(fixture_dir().join("noncompliant.csv")).await;
    assert_json_snapshot!("noncompliant", snapshot);
}

#[tokio::test(flavor = "current_thread")]
async fn bad_number_fixture_fails_with_line() {
    let path = fixture_dir().join("bad_number.csv");
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("n/a"));

    let err = audit_source(&FileCsvSource::new(&path), &DefaultScorer::default())
        .await
        .expect_err("invalid emissions should fail the audit");
    assert_eq!(
        err.downcast_ref::<ParseError>(),
        Some(&ParseError::InvalidEmission {
            line: 3,
            raw: "n/a".into()
        })
    );
    assert_eq!(err.to_string(), "Row 3: Invalid emission value: 'n/a'");
}
