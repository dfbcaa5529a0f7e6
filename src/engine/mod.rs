// src/engine/mod.rs

//! Execution engine for hostrun.
//!
//! This module ties together:
//! - pluggable strategies deciding how a batch of hosts is walked
//!   (`parallel`, `serial`, or anything registered at runtime)
//! - the executor, which drives one batch and collects outcomes into a
//!   shared, lock-protected result
//! - the deferred pipeline: a first operation followed by queued callback
//!   stages, short-circuiting at the first failed stage

pub mod deferred;
pub mod executor;
pub mod result;
pub mod strategy;

pub use deferred::{Callback, Deferred, LocalBlock, Operation};
pub use executor::Executor;
pub use result::ExecutionResult;
pub use strategy::{BuiltinStrategy, Parallel, Procedure, Serial, Strategy, StrategyRegistry};
