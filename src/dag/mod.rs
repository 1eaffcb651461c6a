// src/dag/mod.rs

//! DAG representation: nodes, edges, and the graph that owns them.
//!
//! - [`node`] holds node metadata and the executor-facing [`NodeSpec`].
//! - [`edge`] is the directed dependency type with optional data-flow refs.
//! - [`graph`] owns the node and edge collections, enforces acyclicity at
//!   edge-insertion time, and computes deterministic ready-sets.
//! - [`state`] is the shared lifecycle state machine and the transition
//!   observability hook.

pub mod edge;
pub mod graph;
pub mod node;
pub mod state;

pub use edge::Edge;
pub use graph::{Dag, DagState};
pub use node::{Node, NodeName, NodeSpec};
pub use state::{NodeState, TracingSink, TransitionRecord, TransitionSink};
