use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Kind of channel a profile connects over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnType {
    Serial,
    Tcp,
    Udp,
}

impl ConnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl FromStr for ConnType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(ClientError::InvalidProfile(format!(
                "unknown connection type {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for ConnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named endpoint: channel kind plus a kind-specific connection string
/// (`host:port` for tcp/udp, a device path for serial).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub conn_type: ConnType,
    #[serde(rename = "connstring")]
    pub conn_string: String,
}

impl ConnProfile {
    pub fn new(
        name: impl Into<String>,
        conn_type: ConnType,
        conn_string: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            conn_type,
            conn_string: conn_string.into(),
        }
    }
}

impl std::fmt::Display for ConnProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: type={}, connstring='{}'",
            self.name, self.conn_type, self.conn_string
        )
    }
}

/// Source of connection profiles. How profiles are stored is up to the implementor.
pub trait ProfileStore {
    fn resolve(&self, name: &str) -> Result<ConnProfile>;
}

/// In-memory profile store keyed by profile name.
#[derive(Clone, Debug, Default)]
pub struct MemoryProfileStore {
    profiles: BTreeMap<String, ConnProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile, replacing (and returning) any profile with the same name.
    pub fn add(&mut self, profile: ConnProfile) -> Option<ConnProfile> {
        self.profiles.insert(profile.name.clone(), profile)
    }

    pub fn delete(&mut self, name: &str) -> Result<ConnProfile> {
        self.profiles
            .remove(name)
            .ok_or_else(|| ClientError::ProfileNotFound(name.to_owned()))
    }

    /// All profiles, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &ConnProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn resolve(&self, name: &str) -> Result<ConnProfile> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::ProfileNotFound(name.to_owned()))
    }
}
