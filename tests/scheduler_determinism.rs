//! Given identical construction order and identical executor responses, two
//! runs produce identical dispatch order and terminal states.

use std::error::Error;
use std::time::Duration;

use dagrun::dag::Dag;
use dagrun::sched::{RunReport, Scheduler, SchedulerConfig};
use dagrun_test_utils::builders::DagBuilder;
use dagrun_test_utils::fake_executor::FakeExecutor;
use dagrun_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn build_dag() -> Dag {
    // Two roots, a shared join, one failing branch.
    DagBuilder::new()
        .node("r1")
        .node("r2")
        .node("mid")
        .node("join")
        .node("leaf")
        .edge("r1", "mid")
        .edge("r2", "mid")
        .edge("mid", "join")
        .edge("r1", "leaf")
        .build()
}

fn build_executor() -> FakeExecutor {
    FakeExecutor::new().slow("r1", 2).slow("mid", 1).failing("leaf")
}

async fn run_once() -> Result<RunReport, Box<dyn Error>> {
    let config = SchedulerConfig {
        max_in_flight: 2,
        poll_interval: Duration::from_millis(1),
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(build_dag(), build_executor(), config);
    Ok(with_timeout(scheduler.run()).await?)
}

#[tokio::test]
async fn identical_inputs_produce_identical_runs() -> TestResult {
    init_tracing();

    let first = run_once().await?;
    let second = run_once().await?;

    assert_eq!(first.dispatch_order, second.dispatch_order);
    assert_eq!(first.outcomes, second.outcomes);
    Ok(())
}
