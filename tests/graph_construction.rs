use std::collections::BTreeMap;
use std::error::Error;

use dagrun::dag::{Dag, DagState, Edge, NodeState};
use dagrun::errors::DagrunError;
use dagrun::exec::JobHandle;
use dagrun_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn duplicate_node_is_rejected() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;

    let err = dag.add_node("a", BTreeMap::new()).unwrap_err();
    assert!(matches!(err, DagrunError::DuplicateNode(name) if name == "a"));
    assert_eq!(dag.node_count(), 1);
    Ok(())
}

#[test]
fn edge_with_unknown_endpoint_is_rejected() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;

    let err = dag.add_edge(Edge::new("a", "missing")).unwrap_err();
    assert!(matches!(err, DagrunError::UnknownNode(name) if name == "missing"));

    let err = dag.add_edge(Edge::new("missing", "a")).unwrap_err();
    assert!(matches!(err, DagrunError::UnknownNode(name) if name == "missing"));

    assert!(dag.edges().is_empty());
    Ok(())
}

#[test]
fn cycle_is_rejected_and_graph_left_unchanged() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.add_node("b", BTreeMap::new())?;
    dag.add_node("c", BTreeMap::new())?;
    dag.add_edge(Edge::new("a", "b"))?;
    dag.add_edge(Edge::new("b", "c"))?;

    // c -> a would close the loop a -> b -> c -> a.
    let err = dag.add_edge(Edge::new("c", "a")).unwrap_err();
    assert!(matches!(
        err,
        DagrunError::Cycle { ref source, ref target } if source == "c" && target == "a"
    ));

    assert_eq!(dag.edges().len(), 2);
    assert!(dag.dependencies_of("a").is_empty());
    assert_eq!(dag.dependents_of("c"), &[] as &[String]);
    Ok(())
}

#[test]
fn self_edge_is_rejected() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;

    let err = dag.add_edge(Edge::new("a", "a")).unwrap_err();
    assert!(matches!(err, DagrunError::Cycle { .. }));
    Ok(())
}

#[test]
fn ready_nodes_respects_dependencies_and_is_idempotent() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.add_node("b", BTreeMap::new())?;
    dag.add_edge(Edge::new("a", "b"))?;

    // Only the root is ready; a second call returns nothing new.
    assert_eq!(dag.ready_nodes()?, vec!["a".to_string()]);
    assert!(dag.ready_nodes()?.is_empty());

    // b becomes ready only after a is Done.
    dag.mark_running("a", JobHandle(1))?;
    assert!(dag.ready_nodes()?.is_empty());
    dag.mark_done("a")?;
    assert_eq!(dag.ready_nodes()?, vec!["b".to_string()]);
    Ok(())
}

#[test]
fn ready_nodes_are_returned_in_insertion_order() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    for name in ["zeta", "alpha", "mid"] {
        dag.add_node(name, BTreeMap::new())?;
    }

    assert_eq!(
        dag.ready_nodes()?,
        vec!["zeta".to_string(), "alpha".to_string(), "mid".to_string()]
    );
    Ok(())
}

#[test]
fn sealed_graph_rejects_mutation() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.seal();

    assert!(matches!(
        dag.add_node("b", BTreeMap::new()).unwrap_err(),
        DagrunError::InvalidState(_)
    ));
    assert!(matches!(
        dag.add_edge(Edge::new("a", "a")).unwrap_err(),
        DagrunError::InvalidState(_)
    ));
    Ok(())
}

#[test]
fn failure_propagation_cancels_transitive_dependents() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    for name in ["a", "b", "c", "d"] {
        dag.add_node(name, BTreeMap::new())?;
    }
    dag.add_edge(Edge::new("a", "b"))?;
    dag.add_edge(Edge::new("b", "c"))?;
    dag.add_edge(Edge::new("a", "d"))?;

    dag.ready_nodes()?;
    dag.mark_running("a", JobHandle(1))?;

    let mut blocked = dag.mark_failed("a", "boom")?;
    blocked.sort();
    assert_eq!(blocked, vec!["b".to_string(), "c".to_string(), "d".to_string()]);

    for name in ["b", "c", "d"] {
        let node = dag.node(name).unwrap();
        assert_eq!(node.state(), NodeState::Cancelled);
        assert_eq!(node.blocked_by(), Some("a"));
    }
    assert_eq!(dag.node("a").unwrap().failure(), Some("boom"));
    assert!(dag.is_complete());
    Ok(())
}

#[test]
fn cancel_of_terminal_node_is_a_no_op() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.ready_nodes()?;
    dag.mark_running("a", JobHandle(1))?;
    dag.mark_done("a")?;

    assert!(dag.cancel_node("a")?.is_none());
    assert_eq!(dag.node("a").unwrap().state(), NodeState::Done);
    Ok(())
}

#[test]
fn cancel_of_running_node_yields_its_handle() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.ready_nodes()?;
    dag.mark_running("a", JobHandle(7))?;

    assert_eq!(dag.cancel_node("a")?, Some(JobHandle(7)));
    assert_eq!(dag.node("a").unwrap().state(), NodeState::Cancelled);
    Ok(())
}

#[test]
fn illegal_transition_is_rejected() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;

    // Unscheduled -> Done skips Ready/Running.
    assert!(matches!(
        dag.mark_done("a").unwrap_err(),
        DagrunError::InvalidState(_)
    ));
    Ok(())
}

#[test]
fn aggregate_state_follows_node_states() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("a", BTreeMap::new())?;
    dag.add_node("b", BTreeMap::new())?;
    dag.add_edge(Edge::new("a", "b"))?;

    assert_eq!(dag.state(), DagState::Pending);

    dag.ready_nodes()?;
    assert_eq!(dag.state(), DagState::Runnable);

    dag.mark_running("a", JobHandle(1))?;
    assert_eq!(dag.state(), DagState::Running);

    dag.mark_done("a")?;
    dag.ready_nodes()?;
    dag.mark_running("b", JobHandle(2))?;
    dag.mark_done("b")?;
    assert_eq!(dag.state(), DagState::Complete);
    assert!(dag.is_complete());
    Ok(())
}

#[test]
fn spec_carries_attributes_and_inbound_data_refs() -> TestResult {
    init_tracing();

    let mut dag = Dag::new();
    dag.add_node("fetch", attrs(&[("cmd", "curl ...")]))?;
    dag.add_node("render", attrs(&[("cmd", "render"), ("cwd", "/tmp")]))?;
    dag.add_edge(Edge::new("fetch", "render").with_data("raw.dat"))?;

    let spec = dag.spec_for("render")?;
    assert_eq!(spec.name, "render");
    assert_eq!(spec.attributes.get("cwd").map(String::as_str), Some("/tmp"));
    assert_eq!(spec.inputs, vec!["raw.dat".to_string()]);

    // No inbound edges: no inputs.
    assert!(dag.spec_for("fetch")?.inputs.is_empty());
    Ok(())
}
