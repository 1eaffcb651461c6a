//! The concurrency budget bounds how many nodes are in flight at once.

use std::error::Error;
use std::time::Duration;

use dagrun::sched::{Scheduler, SchedulerConfig};
use dagrun_test_utils::builders::DagBuilder;
use dagrun_test_utils::fake_executor::FakeExecutor;
use dagrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn config_with_budget(max_in_flight: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_in_flight,
        poll_interval: Duration::from_millis(1),
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn budget_of_one_serializes_independent_nodes() -> TestResult {
    init_tracing();

    let dag = DagBuilder::new().node("a").node("b").build();

    let executor = FakeExecutor::new().slow("a", 3).slow("b", 3);
    let probe = executor.probe();
    let scheduler = Scheduler::new(dag, executor, config_with_budget(1));

    let report = with_timeout(scheduler.run()).await?;

    assert!(report.all_done());
    assert_eq!(probe.peak_in_flight(), 1);
    assert_eq!(probe.submitted().len(), 2);
    Ok(())
}

#[tokio::test]
async fn wider_budget_runs_independent_nodes_together() -> TestResult {
    init_tracing();

    let dag = DagBuilder::new().node("a").node("b").node("c").build();

    let executor = FakeExecutor::new().slow("a", 3).slow("b", 3).slow("c", 3);
    let probe = executor.probe();
    let scheduler = Scheduler::new(dag, executor, config_with_budget(3));

    let report = with_timeout(scheduler.run()).await?;

    assert!(report.all_done());
    // All three are admitted in the same pass, before any completes.
    assert_eq!(probe.peak_in_flight(), 3);
    Ok(())
}

#[tokio::test]
async fn nodes_beyond_budget_are_admitted_on_later_passes() -> TestResult {
    init_tracing();

    let dag = DagBuilder::new().node("a").node("b").node("c").node("d").build();

    let executor = FakeExecutor::new()
        .slow("a", 2)
        .slow("b", 2)
        .slow("c", 2)
        .slow("d", 2);
    let probe = executor.probe();
    let scheduler = Scheduler::new(dag, executor, config_with_budget(2));

    let report = with_timeout(scheduler.run()).await?;

    assert!(report.all_done());
    assert!(probe.peak_in_flight() <= 2);
    assert_eq!(probe.submitted().len(), 4);
    // Deterministic admission: insertion order.
    assert_eq!(probe.submitted()[..2], ["a".to_string(), "b".to_string()]);
    Ok(())
}
