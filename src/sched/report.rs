// src/sched/report.rs

//! Final run result types.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::dag::{Dag, NodeName, NodeState};

/// Terminal outcome of one node, with the originating cause where the node
/// did not finish on its own terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Done,
    Failed {
        error: String,
    },
    /// Cancelled directly (whole-graph cancellation or `Dag::cancel_node`).
    Cancelled,
    /// Never ran because the named ancestor failed.
    CancelledByDependency {
        ancestor: NodeName,
    },
}

impl NodeOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, NodeOutcome::Done)
    }
}

impl fmt::Display for NodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeOutcome::Done => write!(f, "done"),
            NodeOutcome::Failed { error } => write!(f, "failed ({error})"),
            NodeOutcome::Cancelled => write!(f, "cancelled"),
            NodeOutcome::CancelledByDependency { ancestor } => {
                write!(f, "cancelled (dependency '{ancestor}' failed)")
            }
        }
    }
}

/// Per-run result: terminal state of every node plus the order in which
/// nodes were dispatched (for reproducibility checks and diagnostics).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: BTreeMap<NodeName, NodeOutcome>,
    pub dispatch_order: Vec<NodeName>,
}

impl RunReport {
    /// Snapshot a graph whose nodes are all terminal.
    pub(crate) fn from_dag(dag: &Dag, dispatch_order: Vec<NodeName>) -> Self {
        let mut outcomes = BTreeMap::new();

        for node in dag.nodes() {
            let outcome = match node.state() {
                NodeState::Done => NodeOutcome::Done,
                NodeState::Failed => NodeOutcome::Failed {
                    error: node
                        .failure()
                        .unwrap_or("no failure reason recorded")
                        .to_string(),
                },
                NodeState::Cancelled => match node.blocked_by() {
                    Some(ancestor) => NodeOutcome::CancelledByDependency {
                        ancestor: ancestor.to_string(),
                    },
                    None => NodeOutcome::Cancelled,
                },
                other => {
                    // Reports are only built from completed graphs.
                    warn!(node = %node.name(), state = %other, "non-terminal node in run report");
                    NodeOutcome::Cancelled
                }
            };
            outcomes.insert(node.name().to_string(), outcome);
        }

        Self {
            outcomes,
            dispatch_order,
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(name)
    }

    /// True iff every node finished Done.
    pub fn all_done(&self) -> bool {
        self.outcomes.values().all(NodeOutcome::is_done)
    }

    /// Names of nodes that finished Failed.
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, NodeOutcome::Failed { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Human-readable per-node summary, one line per node.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, outcome) in &self.outcomes {
            out.push_str(&format!("  {name}: {outcome}\n"));
        }
        out
    }
}
