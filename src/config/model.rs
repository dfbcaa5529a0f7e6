// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// default_user = "deploy"
/// order = "parallel"
/// hosts = ["web1.example.com?stage=production", "deploy@db1:2222"]
///
/// [variables]
/// app = "shop"
/// release_dir = "/srv/%{app}/releases"
///
/// [command.uptime]
/// run = "uptime"
/// then = ["who-we-are"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Global settings and the host set, from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// `[variables]`; values containing `%{name}` are interpolated lazily.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// All commands from `[command.<name>]`, keyed by command name.
    #[serde(default)]
    pub command: BTreeMap<String, CommandConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Applied to every host that does not name its own user.
    #[serde(default)]
    pub default_user: Option<String>,

    /// Strategy used by commands without their own `order`.
    #[serde(default = "default_order")]
    pub order: String,

    /// Status line name column width. Derived from the host set if omitted.
    #[serde(default)]
    pub hostname_width: Option<usize>,

    #[serde(default = "default_color")]
    pub color: bool,

    #[serde(default)]
    pub transport: TransportKind,

    /// Host strings, `user@address:port?key=value&...`.
    #[serde(default)]
    pub hosts: Vec<String>,
}

fn default_order() -> String {
    "parallel".to_string()
}

fn default_color() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_user: None,
            order: default_order(),
            hostname_width: None,
            color: default_color(),
            transport: TransportKind::default(),
            hosts: Vec::new(),
        }
    }
}

/// Which transport reaches the hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// The system `ssh` client.
    #[default]
    Ssh,
    /// Every host runs on this machine, under `$HOME`. Handy for trying
    /// commands out.
    Local,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Ssh => f.write_str("ssh"),
            TransportKind::Local => f.write_str("local"),
        }
    }
}

/// `[command.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Shell command run on every host.
    #[serde(default)]
    pub run: Option<String>,

    /// Script file (relative to the config file) uploaded and run on every
    /// host.
    #[serde(default)]
    pub script: Option<String>,

    /// Shell command run once on this machine.
    #[serde(default)]
    pub local: Option<String>,

    /// Strategy override for this command.
    #[serde(default)]
    pub order: Option<String>,

    /// `key=value` host filters; a host must match all of them.
    #[serde(default)]
    pub filter: Vec<String>,

    /// Print each host's output once the command is done.
    #[serde(default)]
    pub show_output: bool,

    /// Commands chained after this one.
    #[serde(default)]
    pub then: Vec<String>,
}

impl CommandConfig {
    /// How many of `run` / `script` / `local` are set.
    pub fn operation_count(&self) -> usize {
        [self.run.is_some(), self.script.is_some(), self.local.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count()
    }
}
