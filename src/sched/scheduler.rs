// src/sched/scheduler.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::dag::{Dag, DagState, NodeName, NodeState};
use crate::errors::{DagrunError, Result};
use crate::exec::{ExecutorBackend, JobStatus};
use crate::sched::report::RunReport;

/// Tunables for one scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrency budget: at most this many nodes in flight.
    pub max_in_flight: usize,
    /// Transient dispatch/poll failures tolerated per node before it is
    /// flipped to Failed.
    pub dispatch_retries: u32,
    /// Pause between scheduling passes.
    pub poll_interval: Duration,
    /// Bound on any single executor call; a timeout counts as a transient
    /// failure.
    pub op_timeout: Duration,
    /// Whole-run deadline; exceeding it cancels remaining nodes and
    /// surfaces an error.
    pub run_timeout: Option<Duration>,
    /// Consecutive passes with nothing ready or running before the
    /// deadlock detector fires.
    pub stall_passes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            dispatch_retries: 3,
            poll_interval: Duration::from_millis(50),
            op_timeout: Duration::from_secs(5),
            run_timeout: None,
            stall_passes: 25,
        }
    }
}

/// Clonable handle for requesting cancellation of a whole run from another
/// task (e.g. a Ctrl-C handler).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What became of a single dispatch attempt.
enum FireResult {
    Fired,
    /// Transient failure; the node stays Ready and is retried next pass.
    Retry,
    /// Retry budget exhausted; the node is now Failed.
    Failed,
}

/// Drives a sealed [`Dag`] to completion against an [`ExecutorBackend`].
///
/// The scheduler is the single writer of graph state: every mutation flows
/// through this loop, while the executor performs the actual work on its own
/// tasks. Each pass collects newly ready nodes, admits up to the concurrency
/// budget, polls everything in flight, and re-checks the termination,
/// deadlock and timeout conditions.
pub struct Scheduler<E: ExecutorBackend> {
    dag: Dag,
    executor: E,
    config: SchedulerConfig,
    cancel_flag: Arc<AtomicBool>,
    /// Ready nodes awaiting admission, oldest first.
    ready_queue: VecDeque<NodeName>,
    dispatch_order: Vec<NodeName>,
}

impl<E: ExecutorBackend> fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("dag", &self.dag)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Scheduler<E> {
    pub fn new(dag: Dag, executor: E, config: SchedulerConfig) -> Self {
        Self {
            dag,
            executor,
            config,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            ready_queue: VecDeque::new(),
            dispatch_order: Vec::new(),
        }
    }

    /// Handle that cancels this run when triggered.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel_flag),
        }
    }

    /// Run the graph to completion.
    ///
    /// Returns a [`RunReport`] when every node reached a terminal state,
    /// including runs ended early by the cancel handle. Deadlock, run
    /// timeout, and executor unavailability surface as errors.
    pub async fn run(mut self) -> Result<RunReport> {
        self.dag.seal();
        info!(
            nodes = self.dag.node_count(),
            edges = self.dag.edges().len(),
            max_in_flight = self.config.max_in_flight,
            "starting DAG run"
        );

        let started = Instant::now();
        let mut stalled_passes: u32 = 0;

        loop {
            if self.cancel_flag.load(Ordering::SeqCst) {
                info!("cancellation requested; stopping dispatch");
                self.cancel_all().await;
                break;
            }

            // Collect.
            let newly_ready = self.dag.ready_nodes()?;
            if !newly_ready.is_empty() {
                debug!(nodes = ?newly_ready, "nodes became ready");
                self.ready_queue.extend(newly_ready);
            }

            // Admit up to the concurrency budget. Nodes left over stay in
            // the queue for the next pass.
            self.admit().await?;

            // Reconcile every running node with the executor.
            for name in self.dag.running_nodes() {
                self.poll(&name).await?;
            }

            if self.dag.is_complete() {
                info!(elapsed = ?started.elapsed(), "all nodes terminal; run complete");
                break;
            }

            // Deadlock detection: the graph is incomplete but nothing is
            // ready, queued or running, and no progress can occur.
            if self.dag.state() == DagState::Pending && self.ready_queue.is_empty() {
                stalled_passes += 1;
                if stalled_passes > self.config.stall_passes {
                    let stuck = self.dag.non_terminal_nodes();
                    warn!(?stuck, "no runnable work for too many passes; reporting deadlock");
                    return Err(DagrunError::Deadlock(stuck));
                }
            } else {
                stalled_passes = 0;
            }

            if let Some(limit) = self.config.run_timeout {
                if started.elapsed() >= limit {
                    warn!(?limit, "run timeout exceeded; cancelling remaining nodes");
                    self.cancel_all().await;
                    return Err(DagrunError::RunTimeout(limit));
                }
            }

            sleep(self.config.poll_interval).await;
        }

        Ok(RunReport::from_dag(&self.dag, self.dispatch_order))
    }

    /// Dispatch queued ready nodes while the budget allows.
    async fn admit(&mut self) -> Result<()> {
        let mut in_flight = self.dag.running_nodes().len();
        let mut deferred = Vec::new();

        while in_flight < self.config.max_in_flight {
            let Some(name) = self.ready_queue.pop_front() else {
                break;
            };

            // Failure propagation may have cancelled the node while queued.
            if self.dag.node(&name).map(|n| n.state()) != Some(NodeState::Ready) {
                debug!(node = %name, "skipping queued node no longer ready");
                continue;
            }

            match self.fire(&name).await? {
                FireResult::Fired => in_flight += 1,
                FireResult::Retry => deferred.push(name),
                FireResult::Failed => {}
            }
        }

        self.ready_queue.extend(deferred);
        Ok(())
    }

    /// Submit one ready node to the executor.
    async fn fire(&mut self, name: &str) -> Result<FireResult> {
        let spec = self.dag.spec_for(name)?;
        debug!(node = %name, "dispatching node to executor");

        match timeout(self.config.op_timeout, self.executor.submit(spec)).await {
            Ok(Ok(handle)) => {
                self.dag.mark_running(name, handle)?;
                self.dispatch_order.push(name.to_string());
                info!(node = %name, %handle, "node fired");
                Ok(FireResult::Fired)
            }
            Ok(Err(err)) if err.is_fatal() => {
                error!(node = %name, error = %err, "executor unavailable; aborting run");
                self.cancel_all().await;
                Err(err)
            }
            Ok(Err(err)) => self.dispatch_failed(name, &err.to_string()),
            Err(_elapsed) => self.dispatch_failed(name, "submit timed out"),
        }
    }

    fn dispatch_failed(&mut self, name: &str, reason: &str) -> Result<FireResult> {
        let attempts = self.dag.note_dispatch_failure(name);
        if attempts > self.config.dispatch_retries {
            warn!(
                node = %name,
                attempts,
                "dispatch retry budget exhausted; failing node"
            );
            let blocked = self.dag.mark_failed(
                name,
                format!("dispatch failed after {attempts} attempts: {reason}"),
            )?;
            if !blocked.is_empty() {
                info!(node = %name, ?blocked, "dependents cancelled by failure");
            }
            Ok(FireResult::Failed)
        } else {
            warn!(
                node = %name,
                attempts,
                reason,
                "transient dispatch failure; will retry next pass"
            );
            Ok(FireResult::Retry)
        }
    }

    /// Poll one running node and advance its state on a terminal answer.
    async fn poll(&mut self, name: &str) -> Result<()> {
        let Some(handle) = self.dag.node(name).and_then(|n| n.handle()) else {
            return Ok(());
        };

        match timeout(self.config.op_timeout, self.executor.status(handle)).await {
            Ok(Ok(JobStatus::Running)) => Ok(()),
            Ok(Ok(JobStatus::Done)) => {
                info!(node = %name, "node completed");
                self.dag.mark_done(name)
            }
            Ok(Ok(JobStatus::Failed)) => {
                warn!(node = %name, "node failed");
                let blocked = self.dag.mark_failed(name, "executor reported failure")?;
                if !blocked.is_empty() {
                    info!(node = %name, ?blocked, "dependents cancelled by failure");
                }
                Ok(())
            }
            Ok(Err(err)) if err.is_fatal() => {
                error!(node = %name, error = %err, "executor unavailable; aborting run");
                self.cancel_all().await;
                Err(err)
            }
            Ok(Err(err)) => self.poll_failed(name, &err.to_string()),
            Err(_elapsed) => self.poll_failed(name, "status poll timed out"),
        }
    }

    fn poll_failed(&mut self, name: &str, reason: &str) -> Result<()> {
        let failures = self.dag.note_poll_failure(name);
        if failures > self.config.dispatch_retries {
            warn!(node = %name, failures, "poll retry budget exhausted; failing node");
            let blocked = self.dag.mark_failed(
                name,
                format!("status polling failed after {failures} attempts: {reason}"),
            )?;
            if !blocked.is_empty() {
                info!(node = %name, ?blocked, "dependents cancelled by failure");
            }
        } else {
            warn!(node = %name, failures, reason, "transient poll failure");
        }
        Ok(())
    }

    /// Cancel every non-terminal node, best-effort.
    ///
    /// Running nodes get an executor cancel first; refusals and timeouts are
    /// logged and otherwise ignored.
    async fn cancel_all(&mut self) {
        for name in self.dag.non_terminal_nodes() {
            match self.dag.cancel_node(&name) {
                Ok(Some(handle)) => {
                    match timeout(self.config.op_timeout, self.executor.cancel(handle)).await {
                        Ok(Ok(delivered)) => {
                            debug!(node = %name, delivered, "cancel delivered to executor");
                        }
                        Ok(Err(err)) => {
                            warn!(node = %name, error = %err, "executor cancel failed");
                        }
                        Err(_elapsed) => {
                            warn!(node = %name, "executor cancel timed out");
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(node = %name, error = %err, "cancel transition failed"),
            }
        }
    }
}
