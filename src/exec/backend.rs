// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The scheduler talks to an [`ExecutorBackend`] instead of a concrete job
//! launcher. This makes it easy to swap in a fake executor in tests while
//! keeping the production process backend in [`process`].
//!
//! - `ProcessBackend` is the default implementation used by `dagrun`. It
//!   runs each node's `cmd` attribute as a local process.
//! - Tests can provide their own `ExecutorBackend` that, for example,
//!   records which nodes were submitted and answers status polls from a
//!   script.
//!
//! [`process`]: super::process

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::dag::NodeSpec;
use crate::errors::Result;

/// Opaque identifier for one submitted unit of work.
///
/// Backends allocate handles however they like; the scheduler only stores
/// and echoes them back for status polls and cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(pub u64);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Externally observable status of a submitted unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
    Failed,
}

/// Trait abstracting how node work is executed.
///
/// All three operations are async so that backends backed by remote
/// middleware can block on I/O; the scheduler bounds each call with its own
/// operation timeout. Errors other than
/// [`DagrunError::ExecutorUnavailable`](crate::errors::DagrunError::ExecutorUnavailable)
/// are treated as transient and retried up to the configured budget.
pub trait ExecutorBackend: Send {
    /// Begin executing the described unit of work.
    fn submit(&mut self, spec: NodeSpec)
    -> Pin<Box<dyn Future<Output = Result<JobHandle>> + Send + '_>>;

    /// Query the current status of previously submitted work.
    fn status(
        &mut self,
        handle: JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus>> + Send + '_>>;

    /// Request early termination, best-effort.
    ///
    /// Returns whether the request was delivered; a `false` return is not an
    /// error (the work may already have finished).
    fn cancel(
        &mut self,
        handle: JobHandle,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + '_>>;
}
