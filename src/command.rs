// src/command.rs

//! Named commands and the pipelines that chain them.
//!
//! Commands are registered once at startup (from `[command.<name>]`
//! sections) and looked up by name. Running a command builds one
//! [`Deferred`] stage over the context's hosts; a [`Pipeline`] runs several
//! commands in order and stops at the first one that fails.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context as _;
use tracing::{debug, info, warn};

use crate::config::{CommandConfig, ConfigFile};
use crate::console::{Color, Effect, Sgr};
use crate::context::Context;
use crate::engine::{Deferred, ExecutionResult, Operation};
use crate::errors::{HostrunError, Result};
use crate::host::{Host, HostFilter};
use crate::outcome::{Outcome, Value};
use crate::script::Script;

/// The first stage of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Shell command run on every host.
    Run(String),
    /// Script file uploaded to and run on every host.
    Script(PathBuf),
    /// Shell command run once on this machine.
    Local(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    name: String,
    description: Option<String>,
    kind: CommandKind,
    order: Option<String>,
    filters: Vec<HostFilter>,
    show_output: bool,
    then: Vec<String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind,
            order: None,
            filters: Vec::new(),
            show_output: false,
            then: Vec::new(),
        }
    }

    pub fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(name, CommandKind::Run(command.into()))
    }

    pub fn script(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, CommandKind::Script(path.into()))
    }

    pub fn local(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(name, CommandKind::Local(command.into()))
    }

    /// Build from a validated `[command.<name>]` section. Script paths are
    /// resolved against `root`.
    pub fn from_config(name: &str, cfg: &CommandConfig, root: &Path) -> Result<Self> {
        let kind = match (&cfg.run, &cfg.script, &cfg.local) {
            (Some(run), None, None) => CommandKind::Run(run.clone()),
            (None, Some(script), None) => CommandKind::Script(root.join(script)),
            (None, None, Some(local)) => CommandKind::Local(local.clone()),
            _ => {
                return Err(HostrunError::Config(format!(
                    "command '{name}' needs exactly one of `run`, `script` or `local`"
                )));
            }
        };

        let filters = cfg
            .filter
            .iter()
            .map(|f| HostFilter::from_str(f))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            description: cfg.description.clone(),
            kind,
            order: cfg.order.clone(),
            filters,
            show_output: cfg.show_output,
            then: cfg.then.clone(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_filter(mut self, filter: HostFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_show_output(mut self, show_output: bool) -> Self {
        self.show_output = show_output;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn filters(&self) -> &[HostFilter] {
        &self.filters
    }

    pub fn show_output(&self) -> bool {
        self.show_output
    }

    pub fn then(&self) -> &[String] {
        &self.then
    }

    /// Build this command's stage against `ctx`, applying `overrides`.
    pub fn deferred(&self, ctx: &Context, overrides: &Overrides) -> Result<Deferred> {
        let vars = ctx.variables();
        let operation = match &self.kind {
            CommandKind::Run(command) => Operation::Command(vars.interpolate_lenient(command)),
            CommandKind::Script(path) => Operation::Script(Script::load(path, vars)?),
            CommandKind::Local(command) => local_operation(vars.interpolate_lenient(command)),
        };

        let mut filters = self.filters.clone();
        filters.extend(overrides.filters.iter().cloned());
        let hosts = ctx.hosts().with(&filters);

        let order = overrides
            .order
            .as_deref()
            .or(self.order.as_deref())
            .unwrap_or(ctx.default_order());

        debug!(command = %self.name, hosts = hosts.len(), order, "building stage");
        let deferred = Deferred::new(operation, hosts, order);

        if self.show_output || overrides.show_output {
            let console = Arc::clone(ctx.console());
            Ok(deferred.and_then(move |host, previous, _| {
                console.puts(render_output(host, previous));
                Ok(previous.value())
            }))
        } else {
            Ok(deferred)
        }
    }
}

/// Command-line adjustments applied to every command of a run.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub order: Option<String>,
    pub filters: Vec<HostFilter>,
    pub show_output: bool,
}

fn local_operation(command: String) -> Operation {
    let description = command.clone();
    Operation::local(description, move |outcome| {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .with_context(|| format!("spawning local command `{command}`"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            outcome.fail(format!(
                "`{command}` exited with {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| c.to_string()),
                stderr.trim()
            ));
        }
        Ok(Value::String(stdout))
    })
}

fn render_output(host: &Host, previous: &Outcome) -> String {
    let header = Sgr::new().effect(Effect::Bold).paint(host.address());
    let mut text = format!("{header}\n");

    let (stdout, stderr) = match previous {
        Outcome::Command(outcome) => (outcome.stdout().to_string(), outcome.stderr().to_string()),
        Outcome::Callback(_) => (value_text(&previous.value()), String::new()),
    };

    for line in stdout.lines() {
        text.push_str("  ");
        text.push_str(line);
        text.push('\n');
    }
    let red = Sgr::new().text(Color::Red);
    for line in stderr.lines() {
        text.push_str("  ");
        text.push_str(&red.paint(line));
        text.push('\n');
    }
    text
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Name -> command lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `[command.<name>]` of a validated config.
    pub fn from_config(cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for (name, command) in cfg.command.iter() {
            registry.register(CommandSpec::from_config(name, command, root)?);
        }
        Ok(registry)
    }

    /// Add `spec`. A second registration under the same name replaces the
    /// first.
    pub fn register(&mut self, spec: CommandSpec) {
        let name = spec.name().to_string();
        if self.commands.insert(name.clone(), spec).is_some() {
            warn!(command = %name, "command registered twice; last registration wins");
        }
    }

    pub fn get(&self, name: &str) -> Result<&CommandSpec> {
        self.commands
            .get(name)
            .ok_or_else(|| HostrunError::UnknownCommand(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// An ordered sequence of command names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<String>,
}

impl Pipeline {
    pub fn new(first: impl Into<String>) -> Self {
        Self {
            commands: vec![first.into()],
        }
    }

    /// A new pipeline running `next` after everything in this one.
    pub fn then(&self, next: impl Into<String>) -> Pipeline {
        let mut commands = self.commands.clone();
        commands.push(next.into());
        Pipeline { commands }
    }

    /// `name` followed by its `then` chain, depth first. A command reached
    /// twice runs once, at its first position.
    pub fn for_command(registry: &CommandRegistry, name: &str) -> Result<Pipeline> {
        let mut commands = Vec::new();
        let mut seen = HashSet::new();
        collect_chain(registry, name, &mut seen, &mut commands)?;
        Ok(Pipeline { commands })
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Run each command in turn, printing a banner before each one. Stops
    /// after the first command whose stage failed.
    pub fn run(
        &self,
        ctx: &Context,
        registry: &CommandRegistry,
        overrides: &Overrides,
    ) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        for name in &self.commands {
            let spec = registry.get(name)?;
            ctx.console().puts(banner(spec));
            info!(command = %name, "running command");

            let result = spec.deferred(ctx, overrides)?.run(ctx)?;
            let failed = result.is_failed();
            report.results.push((name.clone(), result));

            if failed {
                warn!(command = %name, "command failed; stopping pipeline");
                break;
            }
        }
        Ok(report)
    }
}

fn collect_chain(
    registry: &CommandRegistry,
    name: &str,
    seen: &mut HashSet<String>,
    commands: &mut Vec<String>,
) -> Result<()> {
    if !seen.insert(name.to_string()) {
        return Ok(());
    }
    let spec = registry.get(name)?;
    commands.push(name.to_string());
    for next in spec.then() {
        collect_chain(registry, next, seen, commands)?;
    }
    Ok(())
}

fn banner(spec: &CommandSpec) -> String {
    let title = Sgr::new().text(Color::Blue).effect(Effect::Bold);
    match spec.description() {
        Some(description) => format!("{} {description}", title.paint(&format!("==> {}:", spec.name()))),
        None => title.paint(&format!("==> {}", spec.name())),
    }
}

/// The results of each command a pipeline ran, in order.
#[derive(Debug, Default)]
pub struct PipelineReport {
    results: Vec<(String, ExecutionResult)>,
}

impl PipelineReport {
    pub fn is_successful(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_successful())
    }

    /// Names of the commands that ran.
    pub fn commands(&self) -> Vec<&str> {
        self.results.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn result(&self, name: &str) -> Option<&ExecutionResult> {
        self.results
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
