// src/exec/mod.rs

//! Per-host remote operations.
//!
//! - [`command`] runs one command and drives its outcome from channel events.
//! - [`script`] installs a script under the remote home and runs it.
//! - [`files`] moves file contents over the host's session.
//!
//! All of them go through the context's session pool, so every operation on
//! a host reuses the one connection opened for it.

pub mod command;
pub mod files;
pub mod script;

pub use command::run_command;
pub use files::{download, upload};
pub use script::run_script;
