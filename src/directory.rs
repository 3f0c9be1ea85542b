//! # Summary
//!
//! Static directory of council members, loaded once at startup and
//! shared read-only afterwards. One record per line, `memberId,host,port`;
//! blank lines and `#` comments are skipped. Any malformed record fails
//! the whole load.

use std::collections::BTreeMap as Map;
use std::path::Path;

use crate::error::ConfigError;

/// Network location of a single member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerDirectory {
    members: Map<String, Address>,
}

impl PeerDirectory {
    /// Reads and parses the directory file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?
            .parse()
    }

    /// Number of members that forms a majority.
    pub fn quorum(&self) -> usize {
        self.members.len() / 2 + 1
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Member IDs in sorted order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn address(&self, id: &str) -> Result<&Address, ConfigError> {
        self.members.get(id).ok_or_else(|| ConfigError::UnknownMember {
            id: id.to_string(),
            known: self.members.keys().cloned().collect(),
        })
    }
}

impl std::str::FromStr for PeerDirectory {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut members = Map::default();
        for (index, line) in s.lines().enumerate() {
            let line = line.trim();
            let number = index + 1;
            if line.is_empty() || line.starts_with('#') {
                continue
            }

            let parts = line.split(',').map(str::trim).collect::<Vec<_>>();
            let (id, host, port) = match parts.as_slice() {
            | [id, host, port] if !id.is_empty() && !host.is_empty() => (*id, *host, *port),
            | _ => return Err(ConfigError::Malformed { line: number, record: line.to_string() }),
            };

            let port = port.parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { line: number, port: port.to_string() })?;

            let address = Address { host: host.to_string(), port };
            if members.insert(id.to_string(), address).is_some() {
                return Err(ConfigError::DuplicateMember { line: number, id: id.to_string() })
            }
        }

        if members.is_empty() {
            return Err(ConfigError::Empty)
        }

        Ok(PeerDirectory { members })
    }
}
