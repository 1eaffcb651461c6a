// src/exec/process.rs

//! Local process executor backend.
//!
//! Runs a node's `cmd` attribute through the platform shell. Each submitted
//! job is waited on by its own Tokio task; the backend answers status polls
//! from a completion flag shared with that task, so polling never blocks on
//! the child process itself.
//!
//! Attribute conventions understood by this backend:
//! - `cmd` (required): shell command line to run
//! - `cwd` (optional): working directory
//! - every other attribute is exported to the child as an environment
//!   variable, along with `DAGRUN_NODE` (the node name) and
//!   `DAGRUN_INPUTS` (the inbound data-flow references, space separated)

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::dag::NodeSpec;
use crate::errors::{DagrunError, Result};
use crate::exec::backend::{ExecutorBackend, JobHandle, JobStatus};

/// Completion flag shared between the backend and the waiting task.
///
/// `None` while the process runs, then `Some(success)`.
type DoneFlag = Arc<Mutex<Option<bool>>>;

struct ProcessJob {
    node: String,
    done: DoneFlag,
    cancel: Option<oneshot::Sender<()>>,
}

/// Executor backend that runs nodes as local shell processes.
pub struct ProcessBackend {
    next_handle: u64,
    jobs: HashMap<JobHandle, ProcessJob>,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            jobs: HashMap::new(),
        }
    }

    fn submit_sync(&mut self, spec: NodeSpec) -> Result<JobHandle> {
        let Some(cmd) = spec.attributes.get("cmd") else {
            return Err(DagrunError::Dispatch {
                node: spec.name.clone(),
                reason: "node has no 'cmd' attribute".to_string(),
            });
        };

        info!(node = %spec.name, cmd = %cmd, "starting node process");

        // Build a shell command appropriate for the platform.
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd);
            c
        };

        if let Some(cwd) = spec.attributes.get("cwd") {
            command.current_dir(cwd);
        }

        for (key, value) in &spec.attributes {
            if key != "cmd" && key != "cwd" {
                command.env(key, value);
            }
        }
        command.env("DAGRUN_NODE", &spec.name);
        command.env("DAGRUN_INPUTS", spec.inputs.join(" "));

        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| DagrunError::Dispatch {
            node: spec.name.clone(),
            reason: format!("spawning process: {err}"),
        })?;

        // Always consume stdout/stderr so pipe buffers don't fill.
        if let Some(stdout) = child.stdout.take() {
            drain_stream(spec.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_stream(spec.name.clone(), "stderr", stderr);
        }

        self.next_handle += 1;
        let handle = JobHandle(self.next_handle);

        let done: DoneFlag = Arc::new(Mutex::new(None));
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let node = spec.name.clone();
        let flag = Arc::clone(&done);
        tokio::spawn(async move {
            let success = tokio::select! {
                exit = child.wait() => match exit {
                    Ok(status) => {
                        debug!(node = %node, code = ?status.code(), "node process exited");
                        status.success()
                    }
                    Err(err) => {
                        warn!(node = %node, error = %err, "waiting on node process failed");
                        false
                    }
                },
                _ = &mut cancel_rx => {
                    info!(node = %node, "cancel requested; killing node process");
                    if let Err(err) = child.kill().await {
                        debug!(node = %node, error = %err, "kill failed; process may have exited");
                    }
                    false
                }
            };

            *flag.lock().expect("process done flag poisoned") = Some(success);
        });

        self.jobs.insert(
            handle,
            ProcessJob {
                node: spec.name,
                done,
                cancel: Some(cancel_tx),
            },
        );

        Ok(handle)
    }

    fn status_sync(&self, handle: JobHandle) -> Result<JobStatus> {
        let job = self.jobs.get(&handle).ok_or_else(|| {
            DagrunError::InvalidState(format!("status poll for unknown handle {handle}"))
        })?;

        let status = match *job.done.lock().expect("process done flag poisoned") {
            None => JobStatus::Running,
            Some(true) => JobStatus::Done,
            Some(false) => JobStatus::Failed,
        };
        Ok(status)
    }

    fn cancel_sync(&mut self, handle: JobHandle) -> bool {
        let Some(job) = self.jobs.get_mut(&handle) else {
            return false;
        };

        match job.cancel.take() {
            Some(tx) => {
                let delivered = tx.send(()).is_ok();
                if !delivered {
                    debug!(node = %job.node, "process already finished while cancelling");
                }
                delivered
            }
            None => false,
        }
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorBackend for ProcessBackend {
    fn submit(
        &mut self,
        spec: NodeSpec,
    ) -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>> {
        // Spawning is synchronous under Tokio; resolve immediately.
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

/// Log a child output stream line by line at debug level.
fn drain_stream(
    node: String,
    label: &'static str,
    stream: impl tokio::io::AsyncRead + Unpin + Send + 'static,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(node = %node, stream = label, "{line}");
        }
    });
}
