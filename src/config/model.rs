// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::sched::SchedulerConfig;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// max_in_flight = 2
/// dispatch_retries = 3
///
/// [node.fetch]
/// cmd = "curl -o raw.dat https://example.org/data"
///
/// [node.render]
/// cmd = "render raw.dat out.png"
/// after = ["fetch"]
/// inputs = { fetch = "raw.dat" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Scheduler tunables from `[scheduler]`.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All nodes from `[node.<name>]`.
    ///
    /// Keys are the node names; a `BTreeMap` keeps graph construction order
    /// deterministic.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// Validated configuration.
///
/// Obtained from [`RawConfigFile`] via `TryFrom`, which runs the semantic
/// checks in [`validate`](super::validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub node: BTreeMap<String, NodeConfig>,
}

impl ConfigFile {
    /// Construct without validation; callers must have validated `raw` data.
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        node: BTreeMap<String, NodeConfig>,
    ) -> Self {
        Self { scheduler, node }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Concurrency budget.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Transient failures tolerated per node before it is failed.
    #[serde(default = "default_dispatch_retries")]
    pub dispatch_retries: u32,

    /// Pause between scheduling passes, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound on a single executor call, in milliseconds.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,

    /// Whole-run deadline in seconds; absent means no deadline.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Consecutive no-progress passes before the deadlock detector fires.
    #[serde(default = "default_stall_passes")]
    pub stall_passes: u32,
}

fn default_max_in_flight() -> usize {
    4
}

fn default_dispatch_retries() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_op_timeout_ms() -> u64 {
    5000
}

fn default_stall_passes() -> u32 {
    25
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            dispatch_retries: default_dispatch_retries(),
            poll_interval_ms: default_poll_interval_ms(),
            op_timeout_ms: default_op_timeout_ms(),
            run_timeout_secs: None,
            stall_passes: default_stall_passes(),
        }
    }
}

impl SchedulerSection {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_in_flight: self.max_in_flight,
            dispatch_retries: self.dispatch_retries,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
            run_timeout: self.run_timeout_secs.map(Duration::from_secs),
            stall_passes: self.stall_passes,
        }
    }
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// The command to execute (becomes the node's `cmd` attribute).
    pub cmd: String,

    /// Names of nodes that must be Done before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Data-flow references, keyed by dependency name: the named artifact of
    /// that dependency is input material for this node.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Extra attributes merged into the node's attribute bag.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}
