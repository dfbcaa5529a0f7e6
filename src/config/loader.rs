// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    load_from_str(&contents).with_context(|| format!("parsing TOML config from {:?}", path))
}

pub fn load_from_str(contents: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks commands, strategies, host strings and the `then` graph.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let config = load_from_path(path)?;
    validate_config(&config).with_context(|| format!("validating config {:?}", path))?;
    Ok(config)
}

/// `Hostrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Hostrun.toml")
}

/// Directory relative paths in the config (script files) resolve against.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
