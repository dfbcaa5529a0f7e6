// src/script.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{HostrunError, Result};
use crate::vars::VariableSet;

/// Remote directory (relative to the remote home) scripts are installed to.
pub const INSTALL_DIRECTORY: &str = ".hostrun/scripts";

/// A script to upload and run on each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    name: String,
    content: String,
}

impl Script {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read `path` and expand `%{name}` placeholders from `vars`. Unknown
    /// variables are left as written.
    pub fn load(path: impl AsRef<Path>, vars: &VariableSet) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HostrunError::Config(format!("script path {path:?} has no file name")))?;

        let raw = fs::read_to_string(path)?;
        debug!(script = name, path = ?path, "loaded script");
        Ok(Self::new(name, vars.interpolate_lenient(&raw)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn install_directory(&self) -> &'static str {
        INSTALL_DIRECTORY
    }

    pub fn install_path(&self) -> String {
        format!("{INSTALL_DIRECTORY}/{}", self.name)
    }
}
