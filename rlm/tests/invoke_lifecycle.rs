//! Invocation lifecycle tests driven through in-process backends.
//!
//! These tests run `Rlm::run` end to end (lookup, config merge, invocation,
//! collection, cleanup) without spawning any process.

use rlm::io::locator::InstallLayout;
use rlm::test_support::{CannedBackend, EngineFixture, scratch_entries};
use rlm::{ConfigOverrides, Error, Rlm, RlmConfig, RlmRequest};
use serde_json::json;
use serde_yaml::{Mapping, Value};

fn client<'a>(
    fixture: &EngineFixture,
    backend: &'a CannedBackend,
) -> Rlm<rlm::io::locator::FixedEngineDir, &'a CannedBackend> {
    Rlm::new(fixture.locator(), backend)
        .expect("client")
        .with_log_dir(fixture.root().join("logs"))
        .with_scratch_root(fixture.scratch_root())
}

fn raw(yaml: &str) -> ConfigOverrides {
    let mapping: Mapping = serde_yaml::from_str(yaml).expect("yaml");
    ConfigOverrides::Raw(mapping)
}

#[test]
fn success_returns_exact_document_and_removes_transient_files() {
    let fixture = EngineFixture::new(Some("max_depth: 3\n")).expect("fixture");
    let doc = json!({"results": [1, 2], "usage": {"calls": 3}});
    let backend = CannedBackend::writing(doc.clone());

    let got = client(&fixture, &backend)
        .run(&RlmRequest::new("what is 2+2?").with_config(raw("max_depth: 5\n")))
        .expect("run");

    assert_eq!(got, doc);
    let request = &backend.requests()[0];
    assert!(!request.output_path.exists(), "output file survived");
    let config_path = request.config_path.as_ref().expect("config path");
    assert!(!config_path.exists(), "config file survived");
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn request_fields_reach_the_backend() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::writing(json!({"results": [], "usage": {}}));

    client(&fixture, &backend)
        .run(
            &RlmRequest::new("line one\nline two")
                .with_prefix("trial")
                .with_verbose(false),
        )
        .expect("run");

    let request = &backend.requests()[0];
    assert_eq!(request.query, "line one\nline two");
    assert_eq!(request.prefix.as_deref(), Some("trial"));
    assert!(!request.verbose);
    assert_eq!(request.engine_dir, fixture.engine_dir());
    assert_eq!(request.log_dir, fixture.root().join("logs"));
    assert!(request.output_path.starts_with(fixture.scratch_root()));
    assert_eq!(request.timeout, None);
}

#[test]
fn merged_config_overlays_bundled_defaults() {
    let fixture = EngineFixture::new(Some(
        "primary_agent: base-model\nmax_depth: 3\ntruncate_len: 2000\n",
    ))
    .expect("fixture");
    let backend = CannedBackend::writing(json!({"results": [], "usage": {}}));

    client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(raw("max_depth: 6\nexperimental: on\n")))
        .expect("run");

    let seen = backend.configs_seen();
    let contents = seen[0].as_deref().expect("config contents");
    let merged: Mapping = serde_yaml::from_str(contents).expect("merged yaml");
    assert_eq!(merged.get("primary_agent"), Some(&Value::from("base-model")));
    assert_eq!(merged.get("max_depth"), Some(&Value::from(6)));
    assert_eq!(merged.get("truncate_len"), Some(&Value::from(2000)));
    assert_eq!(merged.get("experimental"), Some(&Value::from("on")));
}

#[test]
fn record_config_overrides_every_default() {
    let fixture = EngineFixture::new(Some("max_depth: 9\nsub_agent: bundled\n")).expect("fixture");
    let backend = CannedBackend::writing(json!({"results": [], "usage": {}}));
    let record = RlmConfig {
        primary_agent: "custom".to_string(),
        ..RlmConfig::default()
    };

    client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(record.clone()))
        .expect("run");

    let seen = backend.configs_seen();
    let merged: Mapping = serde_yaml::from_str(seen[0].as_deref().expect("config")).expect("yaml");
    assert_eq!(RlmConfig::from_mapping(&merged).expect("record"), record);
}

#[test]
fn reported_error_carries_value_and_cleans_up() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::writing(json!({"error": "boom"}));

    let err = client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(raw("max_depth: 2\n")))
        .unwrap_err();

    match err {
        Error::EngineReportedError(value) => assert_eq!(value, json!("boom")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn missing_output_is_engine_failure_with_exit_code_and_stderr() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::silent(1, "error: Uncaught TypeError\n");

    let err = client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(raw("max_depth: 2\n")))
        .unwrap_err();

    match &err {
        Error::EngineFailure { exit_code, stderr } => {
            assert_eq!(*exit_code, Some(1));
            assert!(stderr.as_deref().is_some_and(|s| s.contains("Uncaught TypeError")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("exit code 1"));
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn missing_output_after_clean_exit_is_still_a_failure() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::silent(0, "");

    let err = client(&fixture, &backend)
        .run(&RlmRequest::new("q"))
        .unwrap_err();

    assert!(matches!(err, Error::EngineFailure { exit_code: Some(0), .. }));
}

#[test]
fn malformed_output_is_json_error_and_cleans_up() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::raw("{\"results\": [1,");

    let err = client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(raw("max_depth: 2\n")))
        .unwrap_err();

    assert!(matches!(err, Error::Json { .. }));
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn invalid_record_fails_before_invocation_and_cleans_up() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::writing(json!({"results": []}));
    let record = RlmConfig {
        max_depth: 0,
        ..RlmConfig::default()
    };

    let err = client(&fixture, &backend)
        .run(&RlmRequest::new("q").with_config(record))
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(backend.calls(), 0);
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn engine_not_found_spawns_nothing_and_writes_nothing() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::writing(json!({"results": []}));
    let install = fixture.root().join("bin");
    std::fs::create_dir_all(&install).expect("install dir");

    let err = Rlm::new(InstallLayout::new(&install), &backend)
        .expect("client")
        .with_scratch_root(fixture.scratch_root())
        .run(&RlmRequest::new("q").with_config(raw("max_depth: 2\n")))
        .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(backend.calls(), 0);
    assert_eq!(scratch_entries(&fixture), 0);
}

#[test]
fn repeated_runs_use_distinct_transient_paths() {
    let fixture = EngineFixture::new(None).expect("fixture");
    let backend = CannedBackend::writing(json!({"results": [], "usage": {}}));
    let rlm = client(&fixture, &backend);

    rlm.run(&RlmRequest::new("a").with_config(raw("max_depth: 1\n")))
        .expect("first");
    rlm.run(&RlmRequest::new("b").with_config(raw("max_depth: 1\n")))
        .expect("second");

    let requests = backend.requests();
    assert_ne!(requests[0].output_path, requests[1].output_path);
    assert_ne!(requests[0].config_path, requests[1].config_path);
    assert_eq!(scratch_entries(&fixture), 0);
}
