// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod console;
pub mod context;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod host;
pub mod logging;
pub mod outcome;
pub mod script;
pub mod transport;
pub mod vars;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::command::{CommandKind, CommandRegistry, Overrides, Pipeline};
use crate::config::{ConfigFile, TransportKind, config_root_dir, load_and_validate};
use crate::console::Console;
use crate::context::Context;
use crate::engine::BuiltinStrategy;
use crate::host::{HostCollection, HostFilter};
use crate::transport::{LocalTransport, SshTransport, Transport};
use crate::vars::{Variable, VariableSet};

/// Exit status used when the run is interrupted with Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the command registry
/// - host set resolution (config or `--hosts`, then filters)
/// - the run context (console, transport, strategies)
/// - the pipeline, run on the blocking pool
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let registry = CommandRegistry::from_config(&cfg, &config_root_dir(&config_path))?;
    let pipeline = Pipeline::for_command(&registry, &args.command)?;
    let hosts = resolve_hosts(&cfg, &args.hosts)?;
    let overrides = overrides_from_args(&args)?;

    if args.dry_run {
        print_dry_run(&cfg, &registry, &pipeline, &hosts, &overrides);
        return Ok(());
    }

    let ctx = build_context(&cfg, hosts, transport_for(cfg.config.transport));
    info!(command = %args.command, hosts = ctx.hosts().len(), "starting pipeline");

    let worker = tokio::task::spawn_blocking(move || {
        let report = pipeline.run(&ctx, &registry, &overrides);
        ctx.console().flush();
        report
    });

    tokio::select! {
        joined = worker => {
            let report = joined.context("pipeline worker panicked")??;
            if report.is_successful() {
                debug!(commands = ?report.commands(), "pipeline complete");
                Ok(())
            } else {
                Err(anyhow!("command `{}` failed", args.command))
            }
        }
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted; exiting");
            eprintln!("hostrun: interrupted");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

/// `--hosts` if given, otherwise `[config].hosts`; the configured default
/// user is applied to both.
pub fn resolve_hosts(cfg: &ConfigFile, cli_hosts: &[String]) -> Result<HostCollection> {
    let entries: &[String] = if cli_hosts.is_empty() {
        &cfg.config.hosts
    } else {
        cli_hosts
    };
    let mut hosts = HostCollection::parse(entries).context("parsing host list")?;
    if let Some(user) = &cfg.config.default_user {
        hosts.apply_default_user(user);
    }
    Ok(hosts)
}

fn overrides_from_args(args: &CliArgs) -> Result<Overrides> {
    if let Some(order) = &args.order {
        BuiltinStrategy::from_str(order).context("invalid --order")?;
    }
    let filters = args
        .filter
        .iter()
        .map(|f| HostFilter::from_str(f))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("invalid --filter")?;

    Ok(Overrides {
        order: args.order.clone(),
        filters,
        show_output: args.show_output,
    })
}

pub fn transport_for(kind: TransportKind) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Ssh => Arc::new(SshTransport::default()),
        TransportKind::Local => Arc::new(LocalTransport::home()),
    }
}

pub fn variables_from_config(cfg: &ConfigFile) -> VariableSet {
    let mut variables = VariableSet::new();
    for (name, value) in cfg.variables.iter() {
        variables.set(name.clone(), Variable::from_config(value.clone()));
    }
    variables
}

/// Context for one run of `cfg` over `hosts`, printing to stdout.
pub fn build_context(
    cfg: &ConfigFile,
    hosts: HostCollection,
    transport: Arc<dyn Transport>,
) -> Context {
    let mut builder = Context::builder(transport)
        .console(Arc::new(Console::stdout(cfg.config.color)))
        .hosts(hosts)
        .variables(variables_from_config(cfg))
        .default_order(cfg.config.order.clone());
    if let Some(width) = cfg.config.hostname_width {
        builder = builder.hostname_width(width);
    }
    builder.build()
}

/// Print the resolved pipeline without connecting anywhere.
fn print_dry_run(
    cfg: &ConfigFile,
    registry: &CommandRegistry,
    pipeline: &Pipeline,
    hosts: &HostCollection,
    overrides: &Overrides,
) {
    println!("hostrun dry-run");
    println!("  config.transport = {}", cfg.config.transport);
    println!("  config.order = {}", cfg.config.order);
    println!();

    println!("hosts ({}):", hosts.len());
    for host in hosts {
        println!("  - {host}");
    }
    println!();

    println!("pipeline ({}):", pipeline.commands().len());
    for name in pipeline.commands() {
        let Ok(spec) = registry.get(name) else {
            continue;
        };
        println!("  - {name}");
        if let Some(description) = spec.description() {
            println!("      description: {description}");
        }
        match spec.kind() {
            CommandKind::Run(command) => println!("      run: {command}"),
            CommandKind::Script(path) => println!("      script: {}", path.display()),
            CommandKind::Local(command) => println!("      local: {command}"),
        }
        let order = overrides
            .order
            .as_deref()
            .or(spec.order())
            .unwrap_or(&cfg.config.order);
        println!("      order: {order}");

        let mut filters = spec.filters().to_vec();
        filters.extend(overrides.filters.iter().cloned());
        if !filters.is_empty() {
            let matching = hosts.with(&filters);
            println!("      hosts: {} of {}", matching.len(), hosts.len());
        }
        if spec.show_output() || overrides.show_output {
            println!("      show_output: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
