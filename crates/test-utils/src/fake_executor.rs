use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use dagrun::dag::NodeSpec;
use dagrun::errors::{DagrunError, Result};
use dagrun::exec::{ExecutorBackend, JobHandle, JobStatus};

/// Scripted behaviour for one node.
#[derive(Debug, Clone)]
pub struct JobScript {
    /// Terminal status reported once the poll countdown reaches zero.
    pub outcome: JobStatus,
    /// Status polls answered `Running` before the outcome is reported.
    pub polls_until_done: u32,
    /// Transient submit errors returned before a submit succeeds.
    pub submit_failures: u32,
    /// Report the executor as unavailable on submit (fatal to the run).
    pub unavailable: bool,
}

impl Default for JobScript {
    fn default() -> Self {
        Self {
            outcome: JobStatus::Done,
            polls_until_done: 0,
            submit_failures: 0,
            unavailable: false,
        }
    }
}

#[derive(Debug, Default)]
struct ExecutionLog {
    submitted: Vec<String>,
    cancelled: Vec<String>,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Shared view into a [`FakeExecutor`]'s observations, usable after the
/// executor has been moved into the scheduler.
#[derive(Debug, Clone)]
pub struct FakeExecutorProbe {
    log: Arc<Mutex<ExecutionLog>>,
}

impl FakeExecutorProbe {
    /// Node names in the order they were submitted.
    pub fn submitted(&self) -> Vec<String> {
        self.log.lock().unwrap().submitted.clone()
    }

    /// Node names whose jobs received a cancel request.
    pub fn cancelled(&self) -> Vec<String> {
        self.log.lock().unwrap().cancelled.clone()
    }

    /// Maximum number of jobs that were in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.log.lock().unwrap().peak_in_flight
    }
}

struct FakeJob {
    node: String,
    remaining_polls: u32,
    outcome: JobStatus,
    finished: bool,
    cancelled: bool,
}

/// A fake executor that:
/// - answers submit/status/cancel from per-node scripts
/// - records submission order, cancellations and peak concurrency
///
/// Unscripted nodes succeed on their first status poll.
pub struct FakeExecutor {
    scripts: HashMap<String, JobScript>,
    submit_failures_seen: HashMap<String, u32>,
    jobs: HashMap<JobHandle, FakeJob>,
    next_handle: u64,
    log: Arc<Mutex<ExecutionLog>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            submit_failures_seen: HashMap::new(),
            jobs: HashMap::new(),
            next_handle: 0,
            log: Arc::new(Mutex::new(ExecutionLog::default())),
        }
    }

    /// Observation handle; clone before moving the executor into a scheduler.
    pub fn probe(&self) -> FakeExecutorProbe {
        FakeExecutorProbe {
            log: Arc::clone(&self.log),
        }
    }

    pub fn script(mut self, node: &str, script: JobScript) -> Self {
        self.scripts.insert(node.to_string(), script);
        self
    }

    /// The node's job reports `Failed` once polled.
    pub fn failing(self, node: &str) -> Self {
        self.script(
            node,
            JobScript {
                outcome: JobStatus::Failed,
                ..JobScript::default()
            },
        )
    }

    /// The node's job answers `Running` for the given number of polls first.
    pub fn slow(self, node: &str, polls: u32) -> Self {
        self.script(
            node,
            JobScript {
                polls_until_done: polls,
                ..JobScript::default()
            },
        )
    }

    /// Submits for the node fail transiently the given number of times.
    pub fn flaky_submit(self, node: &str, failures: u32) -> Self {
        self.script(
            node,
            JobScript {
                submit_failures: failures,
                ..JobScript::default()
            },
        )
    }

    /// Submitting the node reports the executor as unavailable.
    pub fn unavailable_on(self, node: &str) -> Self {
        self.script(
            node,
            JobScript {
                unavailable: true,
                ..JobScript::default()
            },
        )
    }

    fn submit_sync(&mut self, spec: NodeSpec) -> Result<JobHandle> {
        let script = self.scripts.get(&spec.name).cloned().unwrap_or_default();

        if script.unavailable {
            return Err(DagrunError::ExecutorUnavailable(
                "scripted executor outage".to_string(),
            ));
        }

        let seen = self
            .submit_failures_seen
            .entry(spec.name.clone())
            .or_insert(0);
        if *seen < script.submit_failures {
            *seen += 1;
            return Err(DagrunError::Dispatch {
                node: spec.name,
                reason: "scripted transient submit failure".to_string(),
            });
        }

        self.next_handle += 1;
        let handle = JobHandle(self.next_handle);

        self.jobs.insert(
            handle,
            FakeJob {
                node: spec.name.clone(),
                remaining_polls: script.polls_until_done,
                outcome: script.outcome,
                finished: false,
                cancelled: false,
            },
        );

        let mut log = self.log.lock().unwrap();
        log.submitted.push(spec.name);
        log.in_flight += 1;
        log.peak_in_flight = log.peak_in_flight.max(log.in_flight);

        Ok(handle)
    }

    fn status_sync(&mut self, handle: JobHandle) -> Result<JobStatus> {
        let job = self.jobs.get_mut(&handle).ok_or_else(|| {
            DagrunError::InvalidState(format!("status poll for unknown handle {handle}"))
        })?;

        if job.cancelled {
            return Ok(JobStatus::Failed);
        }

        if job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            return Ok(JobStatus::Running);
        }

        if !job.finished {
            job.finished = true;
            self.log.lock().unwrap().in_flight -= 1;
        }
        Ok(job.outcome)
    }

    fn cancel_sync(&mut self, handle: JobHandle) -> bool {
        let Some(job) = self.jobs.get_mut(&handle) else {
            return false;
        };

        job.cancelled = true;
        let mut log = self.log.lock().unwrap();
        log.cancelled.push(job.node.clone());
        if !job.finished {
            job.finished = true;
            log.in_flight -= 1;
        }
        true
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBackend for FakeExecutor {
    fn submit(
        &mut self,
        spec: NodeSpec,
    ) -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>> {
        let result = self.submit_sync(spec);
        Box::pin(async move { result })
    }

    fn status(
        &mut self,
        handle: JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus>> + Send + '_>> {
        let result = self.status_sync(handle);
        Box::pin(async move { result })
    }

    fn cancel(
        &mut self,
        handle: JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>> {
        let result = Ok(self.cancel_sync(handle));
        Box::pin(async move { result })
    }
}
