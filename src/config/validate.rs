// src/config/validate.rs

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::engine::BuiltinStrategy;
use crate::errors::HostrunError;
use crate::host::{Host, HostFilter};

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one command
/// - every `order` names a built-in strategy
/// - every command has exactly one of `run`, `script`, `local`
/// - host strings and `filter` entries parse
/// - all `then` references exist, are not self-references and form no cycle
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_commands(cfg)?;
    validate_global_config(cfg)?;
    validate_commands(cfg)?;
    validate_chains(cfg)?;
    validate_chain_graph(cfg)?;
    Ok(())
}

fn ensure_has_commands(cfg: &ConfigFile) -> Result<()> {
    if cfg.command.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [command.<name>] section"
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    BuiltinStrategy::from_str(&cfg.config.order).context("invalid [config].order")?;

    if cfg.config.hostname_width == Some(0) {
        return Err(anyhow!("[config].hostname_width must be >= 1 (got 0)"));
    }

    for entry in &cfg.config.hosts {
        Host::parse(entry).context("invalid entry in [config].hosts")?;
    }
    Ok(())
}

fn validate_commands(cfg: &ConfigFile) -> Result<()> {
    for (name, command) in cfg.command.iter() {
        match command.operation_count() {
            1 => {}
            0 => {
                return Err(anyhow!(
                    "command '{}' needs one of `run`, `script` or `local`",
                    name
                ));
            }
            _ => {
                return Err(anyhow!(
                    "command '{}' sets more than one of `run`, `script` and `local`",
                    name
                ));
            }
        }

        if let Some(order) = &command.order {
            BuiltinStrategy::from_str(order)
                .with_context(|| format!("invalid `order` for command '{name}'"))?;
        }

        for filter in &command.filter {
            HostFilter::from_str(filter)
                .with_context(|| format!("invalid `filter` for command '{name}'"))?;
        }
    }
    Ok(())
}

fn validate_chains(cfg: &ConfigFile) -> Result<()> {
    for (name, command) in cfg.command.iter() {
        for next in command.then.iter() {
            if !cfg.command.contains_key(next) {
                return Err(HostrunError::UnknownCommand(next.clone()))
                    .with_context(|| format!("command '{name}' chains to it in `then`"));
            }
            if next == name {
                return Err(anyhow!("command '{}' cannot chain to itself in `then`", name));
            }
        }
    }
    Ok(())
}

fn validate_chain_graph(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: command -> next, for every `then = ["next"]`.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.command.keys() {
        graph.add_node(name.as_str());
    }

    for (name, command) in cfg.command.iter() {
        for next in command.then.iter() {
            graph.add_edge(name.as_str(), next.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(HostrunError::CommandCycle(cycle.node_id().to_string()).into()),
    }
}
