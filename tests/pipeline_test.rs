//! End-to-end pipeline tests over the fixture templates
//!
//! Fixtures live in tests/fixtures/ and cover the scenarios the engine
//! exists for: a clean multi-resource application, dangling references,
//! and an API whose method definition is contributed both inline and
//! externally with a conflicting authorizer.

use std::path::PathBuf;

use stacklint::pipeline::{run_batch, run_file, PipelineOptions};
use stacklint::template::{parse_document, DocumentFormat};
use stacklint::TemplateError;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_conflicting_methods_end_to_end() {
    let report = run_file(&fixture("conflicting_methods.yaml"), &PipelineOptions::default())
        .expect("no fatal errors");

    // Exactly one conflict, for GET /test, naming both contributing sources.
    assert_eq!(report.conflicts.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.code, "MERGE030");
    assert_eq!(conflict.path, "/test");
    assert_eq!(conflict.method, "get");
    assert!(conflict.first_source.contains("MyApi"));
    assert!(conflict.second_source.contains("HelloFunction"));
    assert_eq!(conflict.diff.len(), 1);
    assert_eq!(conflict.diff[0].path, "security");

    // The rest of the graph still validates: the Cognito pool and the
    // function resolve cleanly, so there are no error diagnostics.
    assert_eq!(report.error_count(), 0, "diagnostics: {:?}", report.diagnostics);
    assert!(!report.is_clean());
}

#[test]
fn test_complete_application_is_clean() {
    let report = run_file(&fixture("complete_app.yaml"), &PipelineOptions::default()).unwrap();
    assert!(
        report.is_clean(),
        "conflicts: {:?}, diagnostics: {:?}",
        report.conflicts,
        report.diagnostics
    );
    assert_eq!(report.summary.resource_count, 4);
    assert_eq!(report.summary.transforms, vec!["AWS::Serverless-2016-10-31"]);
}

#[test]
fn test_broken_references_are_batch_reported() {
    let report = run_file(&fixture("broken_references.yaml"), &PipelineOptions::default()).unwrap();

    let codes: Vec<&str> = report.diagnostics.iter().map(|d| d.code.as_str()).collect();
    assert!(codes.contains(&"VAL040"), "missing Ref finding: {:?}", codes);
    assert!(codes.contains(&"VAL041"), "missing GetAtt finding: {:?}", codes);
    assert!(codes.contains(&"VAL050"), "missing StageName finding: {:?}", codes);
    assert_eq!(report.error_count(), 3);
    assert!(report.conflicts.is_empty());
}

#[test]
fn test_json_format_inferred_from_extension() {
    let report = run_file(&fixture("minimal.json"), &PipelineOptions::default()).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.summary.resource_count, 1);
}

#[test]
fn test_batch_runs_every_document() {
    let paths = vec![
        fixture("complete_app.yaml"),
        fixture("conflicting_methods.yaml"),
        fixture("broken_references.yaml"),
        fixture("minimal.json"),
    ];
    let results = run_batch(&paths, &PipelineOptions::default());
    assert_eq!(results.len(), 4);

    for (path, result) in &results {
        let report = result.as_ref().expect("no fatal errors in fixtures");
        let clean = report.is_clean();
        match path.file_name().and_then(|n| n.to_str()).unwrap() {
            "complete_app.yaml" | "minimal.json" => assert!(clean, "{:?}", path),
            _ => assert!(!clean, "{:?}", path),
        }
    }
}

#[test]
fn test_missing_file_is_an_io_error() {
    let err = run_file(&fixture("does_not_exist.yaml"), &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, TemplateError::Io(_)));
}

#[test]
fn test_run_file_from_written_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.yaml");
    std::fs::write(
        &path,
        "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      Handler: a.h\n      Runtime: python3.12\n",
    )
    .unwrap();
    let report = run_file(&path, &PipelineOptions::default()).unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_fixture_round_trip_reparses_equal() {
    let text = std::fs::read_to_string(fixture("complete_app.yaml")).unwrap();
    let first = parse_document(&text, DocumentFormat::Yaml).unwrap();
    let second = parse_document(&first.to_yaml_string().unwrap(), DocumentFormat::Yaml).unwrap();
    assert_eq!(first, second);
}
