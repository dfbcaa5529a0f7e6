#![allow(dead_code)]

use std::collections::BTreeMap;

use hostrun::config::{CommandConfig, ConfigFile, ConfigSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigFile {
                config: ConfigSection::default(),
                variables: BTreeMap::new(),
                command: BTreeMap::new(),
            },
        }
    }

    pub fn with_command(mut self, name: &str, command: CommandConfig) -> Self {
        self.config.command.insert(name.to_string(), command);
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.config.config.hosts.push(host.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.config
            .variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_order(mut self, order: &str) -> Self {
        self.config.config.order = order.to_string();
        self
    }

    pub fn with_default_user(mut self, user: &str) -> Self {
        self.config.config.default_user = Some(user.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `CommandConfig`.
pub struct CommandConfigBuilder {
    command: CommandConfig,
}

impl CommandConfigBuilder {
    pub fn run(cmd: &str) -> Self {
        Self {
            command: CommandConfig {
                run: Some(cmd.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    pub fn script(path: &str) -> Self {
        Self {
            command: CommandConfig {
                script: Some(path.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    pub fn local(cmd: &str) -> Self {
        Self {
            command: CommandConfig {
                local: Some(cmd.to_string()),
                ..CommandConfig::default()
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.command.description = Some(text.to_string());
        self
    }

    pub fn order(mut self, order: &str) -> Self {
        self.command.order = Some(order.to_string());
        self
    }

    pub fn filter(mut self, filter: &str) -> Self {
        self.command.filter.push(filter.to_string());
        self
    }

    pub fn then(mut self, next: &str) -> Self {
        self.command.then.push(next.to_string());
        self
    }

    pub fn show_output(mut self, val: bool) -> Self {
        self.command.show_output = val;
        self
    }

    pub fn build(self) -> CommandConfig {
        self.command
    }
}
