//! Whole-graph cancellation, run timeout, and deadlock detection.

use std::error::Error;
use std::time::Duration;

use dagrun::errors::DagrunError;
use dagrun::sched::{NodeOutcome, Scheduler, SchedulerConfig};
use dagrun_test_utils::builders::DagBuilder;
use dagrun_test_utils::fake_executor::FakeExecutor;
use dagrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_millis(1),
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn cancel_before_start_marks_everything_cancelled() -> TestResult {
    init_tracing();

    let dag = DagBuilder::new().node("a").node("b").edge("a", "b").build();

    let scheduler = Scheduler::new(dag, FakeExecutor::new(), fast_config());
    scheduler.cancel_handle().cancel();

    let report = with_timeout(scheduler.run()).await?;

    assert_eq!(report.outcome("a"), Some(&NodeOutcome::Cancelled));
    assert_eq!(report.outcome("b"), Some(&NodeOutcome::Cancelled));
    assert!(report.dispatch_order.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_mid_run_stops_dispatch_and_cancels_running_work() -> TestResult {
    init_tracing();

    // a runs effectively forever; b waits behind it.
    let dag = DagBuilder::new().node("a").node("b").edge("a", "b").build();

    let executor = FakeExecutor::new().slow("a", u32::MAX);
    let probe = executor.probe();
    let scheduler = Scheduler::new(dag, executor, fast_config());
    let cancel = scheduler.cancel_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let report = with_timeout(scheduler.run()).await?;

    // a was running and is cancelled directly, not by dependency.
    assert_eq!(report.outcome("a"), Some(&NodeOutcome::Cancelled));
    assert_eq!(report.outcome("b"), Some(&NodeOutcome::Cancelled));
    assert_eq!(probe.cancelled(), vec!["a"]);
    assert_eq!(probe.submitted(), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn run_timeout_cancels_and_surfaces_an_error() -> TestResult {
    init_tracing();

    let dag = DagBuilder::new().node("a").build();

    let executor = FakeExecutor::new().slow("a", u32::MAX);
    let probe = executor.probe();
    let config = SchedulerConfig {
        run_timeout: Some(Duration::from_millis(50)),
        poll_interval: Duration::from_millis(1),
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(dag, executor, config);

    let err = with_timeout(scheduler.run()).await.unwrap_err();
    assert!(matches!(err, DagrunError::RunTimeout(_)));
    assert_eq!(probe.cancelled(), vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn dependents_of_a_precancelled_node_are_reported_as_deadlocked() -> TestResult {
    init_tracing();

    // b can never become ready: its dependency was cancelled before the run
    // and will never be Done. The deadlock detector must report it instead
    // of hanging.
    let mut dag = DagBuilder::new().node("a").node("b").edge("a", "b").build();
    dag.cancel_node("a")?;

    let config = SchedulerConfig {
        stall_passes: 3,
        poll_interval: Duration::from_millis(1),
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(dag, FakeExecutor::new(), config);

    let err = with_timeout(scheduler.run()).await.unwrap_err();
    match err {
        DagrunError::Deadlock(stuck) => assert_eq!(stuck, vec!["b".to_string()]),
        other => panic!("expected Deadlock, got {other:?}"),
    }
    Ok(())
}
