// src/dag/node.rs

//! Node metadata and the description handed to executor backends.

use std::collections::BTreeMap;

use crate::dag::state::NodeState;
use crate::exec::JobHandle;

/// Canonical node name type used throughout the crate.
pub type NodeName = String;

/// A schedulable unit of work owned by the graph.
///
/// The attribute bag is an open string-keyed map describing what the
/// executor should run (e.g. a `cmd` attribute for the process backend);
/// the graph itself attaches no meaning to it.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: NodeName,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) state: NodeState,

    /// Opaque executor handle, recorded when the node is fired.
    pub(crate) handle: Option<JobHandle>,

    /// Transient dispatch failures so far (submit errors and timeouts).
    pub(crate) dispatch_attempts: u32,
    /// Transient poll failures so far (status errors and timeouts).
    pub(crate) poll_failures: u32,

    /// Why the node ended up Failed, if it did.
    pub(crate) failure: Option<String>,
    /// Ancestor whose failure blocked this node from ever running.
    pub(crate) blocked_by: Option<NodeName>,
}

impl Node {
    pub(crate) fn new(name: NodeName, attributes: BTreeMap<String, String>) -> Self {
        Self {
            name,
            attributes,
            state: NodeState::Unscheduled,
            handle: None,
            dispatch_attempts: 0,
            poll_failures: 0,
            failure: None,
            blocked_by: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn handle(&self) -> Option<JobHandle> {
        self.handle
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn blocked_by(&self) -> Option<&str> {
        self.blocked_by.as_deref()
    }
}

/// Description of one unit of work, as handed to an executor backend.
///
/// `inputs` carries the data-flow references of the node's inbound edges;
/// materializing them is the backend's concern, not the graph's.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: NodeName,
    pub attributes: BTreeMap<String, String>,
    pub inputs: Vec<String>,
}
