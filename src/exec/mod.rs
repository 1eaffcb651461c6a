// src/exec/mod.rs

//! Execution layer.
//!
//! The scheduler depends only on the [`ExecutorBackend`] trait; one
//! implementation exists per backend.
//!
//! - [`backend`] defines the trait plus the [`JobHandle`] / [`JobStatus`]
//!   contract types.
//! - [`process`] is the production backend that runs nodes as local shell
//!   processes.

pub mod backend;
pub mod process;

pub use backend::{ExecutorBackend, JobHandle, JobStatus};
pub use process::ProcessBackend;
