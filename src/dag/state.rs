// src/dag/state.rs

//! Node lifecycle states, the shared transition table, and transition
//! observability.
//!
//! Both the graph and the scheduler decide readiness and completion through
//! [`NodeState`]; every accepted transition is delivered to a
//! [`TransitionSink`] as a structured [`TransitionRecord`]. The sink is
//! fire-and-forget: it has no way to fail, so a misbehaving sink can never
//! abort a transition.

use std::fmt;
use std::time::SystemTime;

use tracing::debug;

use crate::dag::node::NodeName;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Registered in the graph, dependencies not yet satisfied.
    Unscheduled,
    /// All dependencies are Done; the node may be dispatched.
    Ready,
    /// Dispatched to the executor, not yet finished.
    Running,
    Done,
    Failed,
    Cancelled,
}

impl NodeState {
    /// Whether this state ends the node's lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Done | NodeState::Failed | NodeState::Cancelled
        )
    }

    /// The transition table.
    ///
    /// Cancellation is accepted from any non-terminal state; everything else
    /// follows the forward path Unscheduled -> Ready -> Running -> Done/Failed.
    /// Ready -> Failed exists because a node whose dispatch retry budget is
    /// exhausted fails without ever having started.
    pub fn can_transition_to(self, to: NodeState) -> bool {
        use NodeState::*;

        match (self, to) {
            (Unscheduled, Ready) => true,
            (Ready, Running) => true,
            (Ready | Running, Failed) => true,
            (Running, Done) => true,
            (Unscheduled | Ready | Running, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Unscheduled => "unscheduled",
            NodeState::Ready => "ready",
            NodeState::Running => "running",
            NodeState::Done => "done",
            NodeState::Failed => "failed",
            NodeState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Structured record of a single accepted state transition.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub node: NodeName,
    pub from: NodeState,
    pub to: NodeState,
    /// Monotonically increasing per-graph sequence number.
    pub seq: u64,
    pub at: SystemTime,
}

/// External sink for transition records.
///
/// Implementations must not block for long; the graph calls `record` inline
/// while holding its own state.
pub trait TransitionSink: Send + Sync {
    fn record(&self, record: &TransitionRecord);
}

/// Default sink: emits each transition as a `tracing` event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn record(&self, record: &TransitionRecord) {
        debug!(
            node = %record.node,
            from = %record.from,
            to = %record.to,
            seq = record.seq,
            "node state transition"
        );
    }
}
