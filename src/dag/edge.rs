// src/dag/edge.rs

//! Directed dependency edges.

use crate::dag::node::NodeName;

/// A directed dependency: `source` must reach Done before `target` may run.
///
/// Edges are immutable once inserted. The optional `data` field is a
/// symbolic reference to an output artifact of `source` that is input
/// material for `target`; it is passed through to the executor backend
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: NodeName,
    pub target: NodeName,
    pub data: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<NodeName>, target: impl Into<NodeName>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}
