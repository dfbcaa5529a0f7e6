// src/host/collection.rs

use std::collections::HashSet;
use std::str::FromStr;

use tracing::debug;

use crate::errors::{HostrunError, Result};
use crate::host::Host;

/// One `name=value` filter, as given to `--filter` or a command's `filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFilter {
    pub name: String,
    pub value: String,
}

impl FromStr for HostFilter {
    type Err = HostrunError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(Self {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(HostrunError::Config(format!(
                "invalid host filter `{s}` (expected name=value)"
            ))),
        }
    }
}

/// Ordered, deduplicated set of hosts.
///
/// Order is insertion order; it is the order `serial` stages visit hosts in.
#[derive(Debug, Clone, Default)]
pub struct HostCollection {
    hosts: Vec<Host>,
    seen: HashSet<String>,
}

impl HostCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every entry with [`Host::parse`].
    pub fn parse<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut collection = Self::new();
        for entry in entries {
            collection.add(Host::parse(entry.as_ref())?);
        }
        Ok(collection)
    }

    /// Add a host; a host whose URI is already present is ignored.
    pub fn add(&mut self, host: Host) -> &mut Self {
        if self.seen.insert(host.uri().to_string()) {
            self.hosts.push(host);
        } else {
            debug!(host = %host, "ignoring duplicate host");
        }
        self
    }

    /// Hosts matching all `filters`, in the same order.
    pub fn with(&self, filters: &[HostFilter]) -> HostCollection {
        self.hosts
            .iter()
            .filter(|host| host.matches(filters))
            .cloned()
            .collect()
    }

    /// Fill in `user` on hosts that do not name one. Identities change, so
    /// the set is rebuilt (and re-deduplicated).
    pub fn apply_default_user(&mut self, user: &str) {
        let hosts = std::mem::take(&mut self.hosts);
        self.seen.clear();
        for mut host in hosts {
            host.set_default_user(user);
            self.add(host);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn as_slice(&self) -> &[Host] {
        &self.hosts
    }

    /// Widest `address`, used to align status lines.
    pub fn max_address_width(&self) -> usize {
        self.hosts
            .iter()
            .map(|h| h.address().chars().count())
            .max()
            .unwrap_or(0)
    }
}

impl FromIterator<Host> for HostCollection {
    fn from_iter<T: IntoIterator<Item = Host>>(iter: T) -> Self {
        let mut collection = HostCollection::new();
        for host in iter {
            collection.add(host);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a HostCollection {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}
