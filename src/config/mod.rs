// src/config/mod.rs

//! Configuration loading and validation for hostrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate commands, strategies, hosts and command chains (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{CommandConfig, ConfigFile, ConfigSection, TransportKind};
pub use validate::validate_config;
