// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sched;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{Dag, Edge};
use crate::errors::{DagrunError, Result};
use crate::exec::ProcessBackend;
use crate::sched::Scheduler;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - graph construction
/// - scheduler + process executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let dag = build_dag(&cfg)?;
    let scheduler = Scheduler::new(dag, ProcessBackend::new(), cfg.scheduler.to_scheduler_config());

    // Ctrl-C → whole-graph cancellation.
    {
        let cancel = scheduler.cancel_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; cancelling run");
            cancel.cancel();
        });
    }

    let report = scheduler.run().await?;

    println!("dagrun result:");
    print!("{}", report.render());

    let failed = report.failed_nodes();
    if !failed.is_empty() {
        return Err(DagrunError::Other(anyhow::anyhow!(
            "run finished with {} failed node(s): {:?}",
            failed.len(),
            failed
        )));
    }

    Ok(())
}

/// Build a [`Dag`] from a validated configuration.
///
/// Nodes are inserted in config order (alphabetical by name, since the
/// config map is a `BTreeMap`), so ready-set ordering is reproducible for a
/// given file. Each node's `cmd` joins its free-form attribute bag; `after`
/// entries become edges carrying the matching `inputs` reference, if any.
pub fn build_dag(cfg: &ConfigFile) -> Result<Dag> {
    let mut dag = Dag::new();

    for (name, node) in cfg.node.iter() {
        let mut attributes = node.attributes.clone();
        attributes.insert("cmd".to_string(), node.cmd.clone());
        dag.add_node(name.clone(), attributes)?;
    }

    for (name, node) in cfg.node.iter() {
        for dep in node.after.iter() {
            let mut edge = Edge::new(dep.clone(), name.clone());
            if let Some(data) = node.inputs.get(dep) {
                edge = edge.with_data(data.clone());
            }
            dag.add_edge(edge)?;
        }
    }

    Ok(dag)
}

/// Simple dry-run output: print scheduler settings, nodes, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    println!("dagrun dry-run");
    println!("  scheduler.max_in_flight = {}", cfg.scheduler.max_in_flight);
    println!(
        "  scheduler.dispatch_retries = {}",
        cfg.scheduler.dispatch_retries
    );
    println!(
        "  scheduler.poll_interval_ms = {}",
        cfg.scheduler.poll_interval_ms
    );
    if let Some(secs) = cfg.scheduler.run_timeout_secs {
        println!("  scheduler.run_timeout_secs = {secs}");
    }
    println!();

    println!("nodes ({}):", cfg.node.len());
    for (name, node) in cfg.node.iter() {
        println!("  - {name}");
        println!("      cmd: {}", node.cmd);
        if !node.after.is_empty() {
            println!("      after: {:?}", node.after);
        }
        for (dep, artifact) in node.inputs.iter() {
            println!("      input: {artifact} (from {dep})");
        }
        for (key, value) in node.attributes.iter() {
            println!("      attr {key} = {value}");
        }
    }

    debug!("dry-run complete (no execution)");
}
