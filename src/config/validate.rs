// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DagrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.node))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_scheduler_section(cfg)?;
    validate_node_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(DagrunError::Config(
            "config must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.max_in_flight == 0 {
        return Err(DagrunError::Config(
            "[scheduler].max_in_flight must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.scheduler.stall_passes == 0 {
        return Err(DagrunError::Config(
            "[scheduler].stall_passes must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_node_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        if node.cmd.trim().is_empty() {
            return Err(DagrunError::Config(format!(
                "node '{}' has an empty `cmd`",
                name
            )));
        }

        for dep in node.after.iter() {
            if !cfg.node.contains_key(dep) {
                return Err(DagrunError::Config(format!(
                    "node '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(DagrunError::Config(format!(
                    "node '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }

        for input_dep in node.inputs.keys() {
            if !node.after.contains(input_dep) {
                return Err(DagrunError::Config(format!(
                    "node '{}' declares an input from '{}' which is not listed in `after`",
                    name, input_dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Build a petgraph graph from the nodes and their dependencies.
    //
    // Edge direction: dep -> node
    // For:
    //   [node.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.node.keys() {
        graph.add_node(name.as_str());
    }

    for (name, node) in cfg.node.iter() {
        for dep in node.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(DagrunError::Config(format!(
                "cycle detected in node graph involving '{}'",
                node
            )))
        }
    }
}
