//! TOML config loading, validation, and graph construction.

use std::error::Error;
use std::fs;

use dagrun::build_dag;
use dagrun::config::loader::load_and_validate;
use dagrun::config::{ConfigFile, RawConfigFile};
use dagrun::errors::DagrunError;
use dagrun_test_utils::builders::{ConfigFileBuilder, NodeConfigBuilder};
use dagrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn load_str(contents: &str) -> Result<ConfigFile, DagrunError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("Dagrun.toml");
    fs::write(&path, contents).expect("write config");
    load_and_validate(&path)
}

#[test]
fn minimal_config_loads_with_defaults() -> TestResult {
    init_tracing();

    let cfg = load_str(
        r#"
[node.a]
cmd = "echo a"

[node.b]
cmd = "echo b"
after = ["a"]
"#,
    )?;

    assert_eq!(cfg.node.len(), 2);
    assert_eq!(cfg.scheduler.max_in_flight, 4);
    assert_eq!(cfg.scheduler.dispatch_retries, 3);
    assert!(cfg.scheduler.run_timeout_secs.is_none());
    Ok(())
}

#[test]
fn scheduler_section_overrides_are_applied() -> TestResult {
    init_tracing();

    let cfg = load_str(
        r#"
[scheduler]
max_in_flight = 1
dispatch_retries = 7
run_timeout_secs = 30

[node.a]
cmd = "echo a"
"#,
    )?;

    let sched = cfg.scheduler.to_scheduler_config();
    assert_eq!(sched.max_in_flight, 1);
    assert_eq!(sched.dispatch_retries, 7);
    assert_eq!(sched.run_timeout, Some(std::time::Duration::from_secs(30)));
    Ok(())
}

#[test]
fn empty_config_is_rejected() {
    init_tracing();

    let err = load_str("").unwrap_err();
    assert!(matches!(err, DagrunError::Config(_)));
}

#[test]
fn unknown_dependency_is_rejected() {
    init_tracing();

    let err = load_str(
        r#"
[node.a]
cmd = "echo a"
after = ["ghost"]
"#,
    )
    .unwrap_err();

    match err {
        DagrunError::Config(msg) => assert!(msg.contains("ghost"), "got: {msg}"),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn dependency_cycle_is_rejected() {
    init_tracing();

    let err = load_str(
        r#"
[node.a]
cmd = "echo a"
after = ["b"]

[node.b]
cmd = "echo b"
after = ["a"]
"#,
    )
    .unwrap_err();

    match err {
        DagrunError::Config(msg) => assert!(msg.contains("cycle"), "got: {msg}"),
        other => panic!("expected Config error, got {other:?}"),
    }
}

#[test]
fn input_from_undeclared_dependency_is_rejected() {
    init_tracing();

    let err = load_str(
        r#"
[node.a]
cmd = "echo a"

[node.b]
cmd = "echo b"
inputs = { a = "raw.dat" }
"#,
    )
    .unwrap_err();

    assert!(matches!(err, DagrunError::Config(_)));
}

#[test]
fn builder_rejects_invalid_raw_config() {
    init_tracing();

    let raw: RawConfigFile = ConfigFileBuilder::new()
        .with_node("a", NodeConfigBuilder::new("").build())
        .build_raw();

    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(DagrunError::Config(_))
    ));
}

#[test]
fn build_dag_wires_nodes_edges_and_data_refs() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_node("fetch", NodeConfigBuilder::new("curl -o raw.dat x").build())
        .with_node(
            "render",
            NodeConfigBuilder::new("render raw.dat")
                .after("fetch")
                .input("fetch", "raw.dat")
                .attribute("cwd", "/tmp")
                .build(),
        )
        .build();

    let dag = build_dag(&cfg)?;

    assert_eq!(dag.node_count(), 2);
    assert_eq!(dag.dependencies_of("render"), &["fetch".to_string()]);
    assert_eq!(dag.dependents_of("fetch"), &["render".to_string()]);

    let spec = dag.spec_for("render")?;
    assert_eq!(spec.attributes.get("cmd").map(String::as_str), Some("render raw.dat"));
    assert_eq!(spec.attributes.get("cwd").map(String::as_str), Some("/tmp"));
    assert_eq!(spec.inputs, vec!["raw.dat".to_string()]);
    Ok(())
}
