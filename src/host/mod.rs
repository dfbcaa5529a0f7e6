// src/host/mod.rs

//! Remote targets.
//!
//! - [`Host`] is one addressable machine. Its identity is the derived
//!   `ssh://` URI: two hosts are equal iff their URIs match.
//! - [`collection`] holds the ordered, deduplicated host set that stages run
//!   against, plus filtering by attribute/property.

pub mod collection;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::{HostrunError, Result};

pub use collection::{HostCollection, HostFilter};

/// Address used for local-only blocks.
pub const LOCALHOST: &str = "localhost";

#[derive(Debug, Clone)]
pub struct Host {
    user: Option<String>,
    address: String,
    port: Option<u16>,
    properties: BTreeMap<String, String>,
    uri: String,
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        let mut host = Self {
            user: None,
            address: address.into(),
            port: None,
            properties: BTreeMap::new(),
            uri: String::new(),
        };
        host.build_uri();
        host
    }

    /// The host that local-only blocks are reported against.
    pub fn localhost() -> Self {
        Self::new(LOCALHOST)
    }

    /// Parse `user@address:port?key=value&key2=value2`.
    ///
    /// Only `address` is required. A leading `ssh://` is accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| HostrunError::InvalidHost {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix("ssh://").unwrap_or(trimmed);

        let (authority, query) = match trimmed.split_once('?') {
            Some((a, q)) => (a, Some(q)),
            None => (trimmed, None),
        };

        let (user, location) = match authority.split_once('@') {
            Some((u, rest)) if !u.is_empty() => (Some(u.to_string()), rest),
            Some(_) => return Err(invalid("empty user before `@`")),
            None => (None, authority),
        };

        // A single `:` separates the port; more than one means a bare IPv6
        // address, which never carries a port in this syntax.
        let (address, port) = match location.split_once(':') {
            Some((addr, port)) if !port.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| invalid("port must be a number between 0 and 65535"))?;
                (addr, Some(port))
            }
            _ => (location, None),
        };

        if address.is_empty() {
            return Err(invalid("missing address"));
        }

        let mut host = Host::new(address).with_port(port);
        host.user = user;

        if let Some(query) = query {
            for fragment in query.split('&').filter(|f| !f.is_empty()) {
                let (name, value) = fragment
                    .split_once('=')
                    .ok_or_else(|| invalid("properties must be written as key=value"))?;
                if name.is_empty() {
                    return Err(invalid("property with an empty name"));
                }
                host.properties.insert(name.to_string(), value.to_string());
            }
        }

        host.build_uri();
        Ok(host)
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.build_uri();
        self
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self.build_uri();
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Canonical fingerprint, e.g. `ssh://deploy@web1:2222?stage=production`.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Set a property. Changes the host's identity.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
        self.build_uri();
    }

    /// Apply `user` only if the host does not already name one.
    pub fn set_default_user(&mut self, user: &str) {
        if self.user.is_none() {
            self.user = Some(user.to_string());
            self.build_uri();
        }
    }

    pub fn is_localhost(&self) -> bool {
        self.address == LOCALHOST
    }

    /// `user@address` as understood by `ssh`.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.address),
            None => self.address.clone(),
        }
    }

    /// True when every filter matches either an attribute (`user`,
    /// `address`, `port`) or a property of the same name.
    pub fn matches(&self, filters: &[HostFilter]) -> bool {
        filters.iter().all(|filter| {
            let actual = match filter.name.as_str() {
                "user" => self.user.clone(),
                "address" => Some(self.address.clone()),
                "port" => self.port.map(|p| p.to_string()),
                other => self.properties.get(other).cloned(),
            };
            actual.as_deref() == Some(filter.value.as_str())
        })
    }

    fn build_uri(&mut self) {
        let mut uri = String::from("ssh://");
        if let Some(user) = &self.user {
            uri.push_str(user);
            uri.push('@');
        }
        uri.push_str(&self.address);
        if let Some(port) = self.port {
            uri.push(':');
            uri.push_str(&port.to_string());
        }
        if !self.properties.is_empty() {
            let query: Vec<String> = self
                .properties
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            uri.push('?');
            uri.push_str(&query.join("&"));
        }
        self.uri = uri;
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for Host {
    type Err = HostrunError;

    fn from_str(s: &str) -> Result<Self> {
        Host::parse(s)
    }
}
