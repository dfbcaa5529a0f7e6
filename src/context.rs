// src/context.rs

//! Everything one run needs, built once and passed down by reference.

use std::sync::Arc;

use tracing::error;

use crate::console::Console;
use crate::engine::{BuiltinStrategy, ExecutionResult, StrategyRegistry};
use crate::host::{HostCollection, LOCALHOST};
use crate::transport::{SessionPool, Transport};
use crate::vars::VariableSet;

/// Called once when a pipeline ends with a failed stage.
pub trait FailureHandler: Send + Sync {
    fn handle(&self, result: &ExecutionResult);
}

/// Flushes the console and terminates the process with status 1.
pub struct ExitOnFailure {
    console: Arc<Console>,
}

impl ExitOnFailure {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

impl FailureHandler for ExitOnFailure {
    fn handle(&self, result: &ExecutionResult) {
        let failed = result.failed_outcomes();
        error!(failed = failed.len(), total = result.len(), "stage failed; exiting");
        self.console.flush();
        std::process::exit(1);
    }
}

pub struct Context {
    console: Arc<Console>,
    hosts: HostCollection,
    variables: VariableSet,
    strategies: StrategyRegistry,
    sessions: SessionPool,
    default_order: String,
    hostname_width: usize,
    failure_handler: Arc<dyn FailureHandler>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("hosts", &self.hosts)
            .field("variables", &self.variables)
            .field("strategies", &self.strategies)
            .field("sessions", &self.sessions)
            .field("default_order", &self.default_order)
            .field("hostname_width", &self.hostname_width)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn builder(transport: Arc<dyn Transport>) -> ContextBuilder {
        ContextBuilder::new(transport)
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    pub fn hosts(&self) -> &HostCollection {
        &self.hosts
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    pub fn default_order(&self) -> &str {
        &self.default_order
    }

    pub fn hostname_width(&self) -> usize {
        self.hostname_width
    }

    pub fn failure_handler(&self) -> &Arc<dyn FailureHandler> {
        &self.failure_handler
    }
}

pub struct ContextBuilder {
    transport: Arc<dyn Transport>,
    console: Option<Arc<Console>>,
    hosts: HostCollection,
    variables: VariableSet,
    strategies: StrategyRegistry,
    default_order: String,
    hostname_width: Option<usize>,
    failure_handler: Option<Arc<dyn FailureHandler>>,
}

impl ContextBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            console: None,
            hosts: HostCollection::new(),
            variables: VariableSet::new(),
            strategies: StrategyRegistry::new(),
            default_order: BuiltinStrategy::Parallel.name().to_string(),
            hostname_width: None,
            failure_handler: None,
        }
    }

    pub fn console(mut self, console: Arc<Console>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn hosts(mut self, hosts: HostCollection) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn variables(mut self, variables: VariableSet) -> Self {
        self.variables = variables;
        self
    }

    pub fn strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn default_order(mut self, order: impl Into<String>) -> Self {
        self.default_order = order.into();
        self
    }

    /// Pad host names to this width; defaults to the widest address in the
    /// host set (and never narrower than `localhost`).
    pub fn hostname_width(mut self, width: usize) -> Self {
        self.hostname_width = Some(width);
        self
    }

    /// Defaults to [`ExitOnFailure`].
    pub fn failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    pub fn build(self) -> Context {
        let console = self
            .console
            .unwrap_or_else(|| Arc::new(Console::stdout(true)));
        let hostname_width = self
            .hostname_width
            .unwrap_or_else(|| self.hosts.max_address_width().max(LOCALHOST.len()));
        let failure_handler = self
            .failure_handler
            .unwrap_or_else(|| Arc::new(ExitOnFailure::new(Arc::clone(&console))));

        Context {
            console,
            hosts: self.hosts,
            variables: self.variables,
            strategies: self.strategies,
            sessions: SessionPool::new(self.transport),
            default_order: self.default_order,
            hostname_width,
            failure_handler,
        }
    }
}
