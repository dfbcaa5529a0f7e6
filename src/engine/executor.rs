// src/engine/executor.rs

use std::sync::Arc;

use tracing::debug;

use crate::engine::result::ExecutionResult;
use crate::engine::strategy::{Strategy, StrategyRegistry};
use crate::errors::Result;

/// Runs a procedure over a batch of items with one strategy, collecting the
/// appended outcomes into a fresh [`ExecutionResult`].
#[derive(Clone)]
pub struct Executor {
    name: String,
    strategy: Arc<dyn Strategy>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("strategy", &self.name).finish()
    }
}

impl Executor {
    /// Look up `order` in `strategies`.
    pub fn new(strategies: &StrategyRegistry, order: &str) -> Result<Self> {
        Ok(Self {
            name: order.to_string(),
            strategy: strategies.get(order)?,
        })
    }

    pub fn with_strategy(name: impl Into<String>, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy,
        }
    }

    pub fn strategy_name(&self) -> &str {
        &self.name
    }

    /// Invoke `procedure(item, result)` for each item.
    ///
    /// An `Err` (or panic) from `procedure` is not caught: it aborts the run
    /// and is returned to the caller.
    pub fn run<I, F>(&self, items: &[I], procedure: F) -> Result<ExecutionResult>
    where
        I: Sync,
        F: Fn(&I, &ExecutionResult) -> Result<()> + Sync,
    {
        debug!(strategy = %self.name, items = items.len(), "executor run");
        let result = ExecutionResult::new();
        self.strategy
            .run(items.len(), &|index: usize| procedure(&items[index], &result))?;
        Ok(result)
    }
}
