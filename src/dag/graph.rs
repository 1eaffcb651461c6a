// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::edge::Edge;
use crate::dag::node::{Node, NodeName, NodeSpec};
use crate::dag::state::{NodeState, TracingSink, TransitionRecord, TransitionSink};
use crate::errors::{DagrunError, Result};
use crate::exec::JobHandle;

/// Aggregate state of the graph, derived from node states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagState {
    /// Nodes exist but none is Ready or Running yet.
    Pending,
    /// At least one node is Ready and none is Running.
    Runnable,
    /// At least one node is Running.
    Running,
    /// Every node is terminal.
    Complete,
}

/// The DAG: exclusive owner of nodes and edges.
///
/// Node names are unique keys; insertion order is preserved so that
/// [`Dag::ready_nodes`] yields a deterministic order and scheduling is
/// reproducible across runs given identical input.
///
/// Acyclicity is enforced at edge-insertion time: an edge is rejected if the
/// target can already reach the source. Structural errors never leave a
/// partial insertion behind.
pub struct Dag {
    nodes: HashMap<NodeName, Node>,
    /// Node names in insertion order.
    order: Vec<NodeName>,
    edges: Vec<Edge>,

    /// Inbound edge sources per node.
    deps: HashMap<NodeName, Vec<NodeName>>,
    /// Outbound edge targets per node.
    dependents: HashMap<NodeName, Vec<NodeName>>,

    /// Set once firing has begun; mutation is rejected afterwards.
    sealed: bool,

    /// Transition sequence counter shared by all nodes of this graph.
    seq: u64,
    sink: Arc<dyn TransitionSink>,
}

impl Dag {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Create a graph that reports state transitions to the given sink.
    pub fn with_sink(sink: Arc<dyn TransitionSink>) -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            deps: HashMap::new(),
            dependents: HashMap::new(),
            sealed: false,
            seq: 0,
            sink,
        }
    }

    /// Register a new node in Unscheduled state.
    pub fn add_node(
        &mut self,
        name: impl Into<NodeName>,
        attributes: BTreeMap<String, String>,
    ) -> Result<()> {
        let name = name.into();
        self.ensure_mutable()?;

        if self.nodes.contains_key(&name) {
            return Err(DagrunError::DuplicateNode(name));
        }

        debug!(node = %name, "adding node to graph");
        self.nodes.insert(name.clone(), Node::new(name.clone(), attributes));
        self.deps.insert(name.clone(), Vec::new());
        self.dependents.insert(name.clone(), Vec::new());
        self.order.push(name);
        Ok(())
    }

    /// Insert a dependency edge.
    ///
    /// Fails with `UnknownNode` if either endpoint is absent and with
    /// `Cycle` if the edge would close a cycle (including self-edges). The
    /// reachability check walks the current edge set, O(V+E) per insertion;
    /// acceptable since construction is not on a hot path.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        self.ensure_mutable()?;

        if !self.nodes.contains_key(&edge.source) {
            return Err(DagrunError::UnknownNode(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(DagrunError::UnknownNode(edge.target));
        }
        if edge.source == edge.target || self.reaches(&edge.target, &edge.source) {
            return Err(DagrunError::Cycle {
                source: edge.source,
                target: edge.target,
            });
        }

        debug!(source = %edge.source, target = %edge.target, "adding edge to graph");

        if let Some(deps) = self.deps.get_mut(&edge.target) {
            deps.push(edge.source.clone());
        }
        if let Some(dependents) = self.dependents.get_mut(&edge.source) {
            dependents.push(edge.target.clone());
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Whether `from` can reach `to` over the current edge set.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in &self.order {
            graph.add_node(name.as_str());
        }
        for edge in &self.edges {
            graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
        }
        has_path_connecting(&graph, from, to, None)
    }

    /// Freeze the structure; called by the scheduler when firing begins.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.sealed {
            return Err(DagrunError::InvalidState(
                "graph is sealed; nodes and edges cannot be added once firing has begun"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Nodes whose dependencies just became satisfied, in insertion order.
    ///
    /// Each returned node is transitioned Unscheduled -> Ready as a side
    /// effect, so calling this twice without an intervening state change
    /// returns an empty second result.
    pub fn ready_nodes(&mut self) -> Result<Vec<NodeName>> {
        // Decide first, then mutate, to keep the borrow checker happy.
        let candidates: Vec<NodeName> = self
            .order
            .iter()
            .filter(|name| {
                let node = &self.nodes[*name];
                node.state == NodeState::Unscheduled && self.deps_satisfied(name.as_str())
            })
            .cloned()
            .collect();

        for name in &candidates {
            self.transition(name, NodeState::Ready)?;
        }

        Ok(candidates)
    }

    fn deps_satisfied(&self, name: &str) -> bool {
        self.dependencies_of(name).iter().all(|dep| {
            self.nodes
                .get(dep)
                .map(|n| n.state == NodeState::Done)
                .unwrap_or(false)
        })
    }

    /// Record that a node was dispatched: Ready -> Running, handle stored.
    pub fn mark_running(&mut self, name: &str, handle: JobHandle) -> Result<()> {
        self.transition(name, NodeState::Running)?;
        if let Some(node) = self.nodes.get_mut(name) {
            node.handle = Some(handle);
        }
        Ok(())
    }

    pub fn mark_done(&mut self, name: &str) -> Result<()> {
        self.transition(name, NodeState::Done)
    }

    /// Flip a node to Failed and cancel every transitive dependent that has
    /// not reached a terminal state.
    ///
    /// Blocked dependents record the originating failed node so the final
    /// report can distinguish cancelled-by-dependency from direct
    /// cancellation. Returns the names of the newly blocked nodes.
    pub fn mark_failed(&mut self, name: &str, reason: impl Into<String>) -> Result<Vec<NodeName>> {
        let reason = reason.into();
        self.transition(name, NodeState::Failed)?;
        if let Some(node) = self.nodes.get_mut(name) {
            node.failure = Some(reason);
        }

        let root = name.to_string();
        let mut stack: Vec<NodeName> = self.dependents_of(name).to_vec();
        let mut blocked = Vec::new();
        let mut visited: HashSet<NodeName> = HashSet::new();

        while let Some(dependent) = stack.pop() {
            if !visited.insert(dependent.clone()) {
                continue;
            }

            let state = match self.nodes.get(&dependent) {
                Some(node) => node.state,
                None => {
                    warn!(node = %dependent, "dependent missing from node map");
                    continue;
                }
            };

            if state.is_terminal() {
                continue;
            }

            self.transition(&dependent, NodeState::Cancelled)?;
            if let Some(node) = self.nodes.get_mut(&dependent) {
                node.blocked_by = Some(root.clone());
            }
            debug!(
                node = %dependent,
                ancestor = %root,
                "cancelling dependent of failed node"
            );
            stack.extend(self.dependents_of(&dependent).iter().cloned());
            blocked.push(dependent);
        }

        Ok(blocked)
    }

    /// Best-effort cancellation of a single node.
    ///
    /// Terminal nodes are left untouched. Returns the executor handle if the
    /// node was Running, so the caller can cancel the external work too.
    pub fn cancel_node(&mut self, name: &str) -> Result<Option<JobHandle>> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| DagrunError::UnknownNode(name.to_string()))?;

        if node.state.is_terminal() {
            return Ok(None);
        }

        self.transition(name, NodeState::Cancelled)?;
        Ok(self.nodes.get_mut(name).and_then(|n| n.handle.take()))
    }

    /// Apply one state transition, enforcing the transition table and
    /// reporting the change to the sink.
    fn transition(&mut self, name: &str, to: NodeState) -> Result<()> {
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| DagrunError::UnknownNode(name.to_string()))?;

        let from = node.state;
        if !from.can_transition_to(to) {
            return Err(DagrunError::InvalidState(format!(
                "node '{name}': {from} -> {to} is not allowed"
            )));
        }

        node.state = to;
        self.seq += 1;

        let record = TransitionRecord {
            node: name.to_string(),
            from,
            to,
            seq: self.seq,
            at: SystemTime::now(),
        };
        self.sink.record(&record);
        Ok(())
    }

    /// Build the executor-facing description of a node: its attribute bag
    /// plus the data-flow references of its inbound edges.
    pub fn spec_for(&self, name: &str) -> Result<NodeSpec> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| DagrunError::UnknownNode(name.to_string()))?;

        let inputs = self
            .edges
            .iter()
            .filter(|e| e.target == name)
            .filter_map(|e| e.data.clone())
            .collect();

        Ok(NodeSpec {
            name: node.name.clone(),
            attributes: node.attributes.clone(),
            inputs,
        })
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().map(|name| &self.nodes[name])
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Immediate dependencies of a node (sources of its inbound edges).
    pub fn dependencies_of(&self, name: &str) -> &[NodeName] {
        self.deps.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Immediate dependents of a node (targets of its outbound edges).
    pub fn dependents_of(&self, name: &str) -> &[NodeName] {
        self.dependents
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Names of nodes currently Running, in insertion order.
    pub fn running_nodes(&self) -> Vec<NodeName> {
        self.nodes()
            .filter(|n| n.state == NodeState::Running)
            .map(|n| n.name.clone())
            .collect()
    }

    /// Names of nodes not yet terminal, in insertion order.
    pub fn non_terminal_nodes(&self) -> Vec<NodeName> {
        self.nodes()
            .filter(|n| !n.state.is_terminal())
            .map(|n| n.name.clone())
            .collect()
    }

    /// True iff every node is terminal.
    pub fn is_complete(&self) -> bool {
        self.nodes().all(|n| n.state.is_terminal())
    }

    /// Aggregate state per the precedence Complete > Running > Runnable.
    pub fn state(&self) -> DagState {
        if self.is_complete() {
            return DagState::Complete;
        }
        if self.nodes().any(|n| n.state == NodeState::Running) {
            return DagState::Running;
        }
        if self.nodes().any(|n| n.state == NodeState::Ready) {
            return DagState::Runnable;
        }
        DagState::Pending
    }

    pub(crate) fn note_dispatch_failure(&mut self, name: &str) -> u32 {
        match self.nodes.get_mut(name) {
            Some(node) => {
                node.dispatch_attempts += 1;
                node.dispatch_attempts
            }
            None => 0,
        }
    }

    pub(crate) fn note_poll_failure(&mut self, name: &str) -> u32 {
        match self.nodes.get_mut(name) {
            Some(node) => {
                node.poll_failures += 1;
                node.poll_failures
            }
            None => 0,
        }
    }
}

impl Default for Dag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dag")
            .field("nodes", &self.order)
            .field("edges", &self.edges.len())
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}
