// src/engine/strategy.rs

use std::collections::BTreeMap;
use std::panic;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::errors::{HostrunError, Result};

/// The per-item procedure a strategy drives, addressed by item index.
pub type Procedure<'a> = dyn Fn(usize) -> Result<()> + Sync + 'a;

/// How a procedure is invoked across a batch of `count` items.
///
/// Implementations decide fan-out and fan-in. They must not return before
/// every procedure call they started has returned, and must hand back the
/// first `Err` a procedure produced.
pub trait Strategy: Send + Sync {
    fn run(&self, count: usize, procedure: &Procedure<'_>) -> Result<()>;
}

/// One thread per item, all joined before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

impl Strategy for Parallel {
    fn run(&self, count: usize, procedure: &Procedure<'_>) -> Result<()> {
        thread::scope(|scope| {
            let handles: Vec<_> = (0..count)
                .map(|index| scope.spawn(move || procedure(index)))
                .collect();

            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        first_error.get_or_insert(err);
                    }
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

/// One item at a time on the calling thread, in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl Strategy for Serial {
    fn run(&self, count: usize, procedure: &Procedure<'_>) -> Result<()> {
        (0..count).try_for_each(procedure)
    }
}

/// Names of the strategies every registry starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStrategy {
    Parallel,
    Serial,
}

impl BuiltinStrategy {
    pub const ALL: [BuiltinStrategy; 2] = [BuiltinStrategy::Parallel, BuiltinStrategy::Serial];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinStrategy::Parallel => "parallel",
            BuiltinStrategy::Serial => "serial",
        }
    }

    fn instance(self) -> Arc<dyn Strategy> {
        match self {
            BuiltinStrategy::Parallel => Arc::new(Parallel),
            BuiltinStrategy::Serial => Arc::new(Serial),
        }
    }
}

impl FromStr for BuiltinStrategy {
    type Err = HostrunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "parallel" => Ok(BuiltinStrategy::Parallel),
            "serial" => Ok(BuiltinStrategy::Serial),
            other => Err(HostrunError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Name -> strategy lookup.
///
/// Registering a name twice replaces the earlier strategy and logs a warning,
/// so tests can override the built-ins.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let strategies = BuiltinStrategy::ALL
            .into_iter()
            .map(|builtin| (builtin.name().to_string(), builtin.instance()))
            .collect();
        Self { strategies }
    }
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn Strategy>) {
        let name = name.into();
        if self.strategies.insert(name.clone(), strategy).is_some() {
            warn!(strategy = %name, "strategy registered twice; last registration wins");
        } else {
            debug!(strategy = %name, "strategy registered");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| HostrunError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}
