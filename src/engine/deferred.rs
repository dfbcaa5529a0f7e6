// src/engine/deferred.rs

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info};

use crate::console::HostStatus;
use crate::context::{Context, FailureHandler};
use crate::engine::executor::Executor;
use crate::engine::result::ExecutionResult;
use crate::errors::Result;
use crate::exec;
use crate::host::{Host, HostCollection};
use crate::outcome::{CallbackOutcome, Outcome, Value};
use crate::script::Script;

/// Body of a local-only operation. Runs once, on this machine.
pub type LocalBlock = Arc<dyn Fn(&mut CallbackOutcome) -> anyhow::Result<Value> + Send + Sync>;

/// A transformation stage: `(host, previous outcome, this stage's outcome)`.
///
/// The previous outcome's [`Outcome::value`] is the value to transform. The
/// callback either returns the new value or calls
/// [`CallbackOutcome::resolve`]; [`CallbackOutcome::fail`] marks the host as
/// failed. Errors and panics are recorded on the outcome.
pub type Callback =
    Box<dyn Fn(&Host, &Outcome, &mut CallbackOutcome) -> anyhow::Result<Value> + Send + Sync>;

/// What the first stage of a [`Deferred`] does.
#[derive(Clone)]
pub enum Operation {
    Command(String),
    Script(Script),
    Local {
        description: String,
        block: LocalBlock,
    },
}

impl Operation {
    pub fn local<F>(description: impl Into<String>, block: F) -> Self
    where
        F: Fn(&mut CallbackOutcome) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Operation::Local {
            description: description.into(),
            block: Arc::new(block),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Operation::Command(command) => format!("run `{command}`"),
            Operation::Script(script) => format!("script {}", script.name()),
            Operation::Local { description, .. } => format!("local {description}"),
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// An operation bound to a host set and a strategy, plus the callback stages
/// queued after it.
///
/// Stages run strictly one after another. As soon as a stage's result is
/// failed (any host failed), the remaining stages are skipped and the failure
/// handler is called once.
pub struct Deferred {
    operation: Operation,
    hosts: HostCollection,
    order: String,
    callbacks: VecDeque<Callback>,
    failure_handler: Option<Arc<dyn FailureHandler>>,
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("operation", &self.operation)
            .field("hosts", &self.hosts.len())
            .field("order", &self.order)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl Deferred {
    pub fn new(operation: Operation, hosts: HostCollection, order: impl Into<String>) -> Self {
        Self {
            operation,
            hosts,
            order: order.into(),
            callbacks: VecDeque::new(),
            failure_handler: None,
        }
    }

    pub fn and_then<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Host, &Outcome, &mut CallbackOutcome) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks.push_back(Box::new(callback));
        self
    }

    /// Replace the context's failure handler for this pipeline.
    pub fn on_failure(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn stage_count(&self) -> usize {
        self.callbacks.len() + 1
    }

    /// Run every stage and return the last result that ran.
    ///
    /// `Err` only for problems outside any single host: an unknown strategy
    /// or a script that could not be installed.
    pub fn run(mut self, ctx: &Context) -> Result<ExecutionResult> {
        let executor = Executor::new(ctx.strategies(), &self.order)?;
        info!(operation = %self.operation.describe(), hosts = self.hosts.len(),
            strategy = %self.order, stages = self.stage_count(), "running pipeline");

        let mut result = self.run_operation(ctx, &executor)?;
        let mut stage = 1;

        while let Some(callback) = self.callbacks.pop_front() {
            if result.is_failed() {
                debug!(stage, skipped = self.callbacks.len() + 1, "stage failed; skipping remaining stages");
                break;
            }
            let previous = result.into_outcomes();
            result = executor.run(&previous, |outcome, result| {
                result.push(run_callback(&callback, outcome));
                Ok(())
            })?;
            stage += 1;
        }

        if result.is_failed() {
            let handler = self
                .failure_handler
                .as_ref()
                .unwrap_or_else(|| ctx.failure_handler());
            handler.handle(&result);
        }
        Ok(result)
    }

    fn run_operation(&self, ctx: &Context, executor: &Executor) -> Result<ExecutionResult> {
        match &self.operation {
            Operation::Command(command) => executor.run(self.hosts.as_slice(), |host, result| {
                result.push(exec::run_command(ctx, host, command));
                Ok(())
            }),
            Operation::Script(script) => executor.run(self.hosts.as_slice(), |host, result| {
                result.push(exec::run_script(ctx, host, script)?);
                Ok(())
            }),
            Operation::Local { description, block } => {
                let host = Host::localhost();
                let status = HostStatus::describing(
                    Arc::clone(ctx.console()),
                    &host,
                    ctx.hostname_width(),
                    description.as_str(),
                );
                let mut outcome = CallbackOutcome::new(host).with_status(status);
                outcome.start();
                let ended = panic::catch_unwind(AssertUnwindSafe(|| block(&mut outcome)));
                outcome.finish(ended);

                let result = ExecutionResult::new();
                result.push(outcome);
                Ok(result)
            }
        }
    }
}

fn run_callback(callback: &Callback, previous: &Outcome) -> CallbackOutcome {
    let host = previous.host();
    let mut outcome = CallbackOutcome::new(host.clone());
    outcome.start();
    let ended = panic::catch_unwind(AssertUnwindSafe(|| callback(host, previous, &mut outcome)));
    outcome.finish(ended);
    outcome
}
