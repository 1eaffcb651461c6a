#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use dagrun::config::{ConfigFile, NodeConfig, RawConfigFile, SchedulerSection};
use dagrun::dag::{Dag, Edge, TransitionSink};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.config.scheduler.max_in_flight = n;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Raw, unvalidated form for error-path tests.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            node: NodeConfig {
                cmd: cmd.to_string(),
                after: vec![],
                inputs: BTreeMap::new(),
                attributes: BTreeMap::new(),
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.node.after.push(dep.to_string());
        self
    }

    pub fn input(mut self, dep: &str, artifact: &str) -> Self {
        self.node.inputs.insert(dep.to_string(), artifact.to_string());
        self
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.node
            .attributes
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}

/// Builder for a [`Dag`] used directly (without going through config).
///
/// Nodes get an empty attribute bag unless specified; the fake executor
/// never looks at attributes.
pub struct DagBuilder {
    dag: Dag,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self { dag: Dag::new() }
    }

    pub fn with_sink(sink: Arc<dyn TransitionSink>) -> Self {
        Self {
            dag: Dag::with_sink(sink),
        }
    }

    pub fn node(mut self, name: &str) -> Self {
        self.dag
            .add_node(name, BTreeMap::new())
            .expect("DagBuilder: add_node failed");
        self
    }

    pub fn node_with_attributes(mut self, name: &str, attributes: BTreeMap<String, String>) -> Self {
        self.dag
            .add_node(name, attributes)
            .expect("DagBuilder: add_node failed");
        self
    }

    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.dag
            .add_edge(Edge::new(source, target))
            .expect("DagBuilder: add_edge failed");
        self
    }

    pub fn data_edge(mut self, source: &str, target: &str, artifact: &str) -> Self {
        self.dag
            .add_edge(Edge::new(source, target).with_data(artifact))
            .expect("DagBuilder: add_edge failed");
        self
    }

    pub fn build(self) -> Dag {
        self.dag
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}
