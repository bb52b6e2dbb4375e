// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that dot uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use crate::digest::Digest;

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Registry manifest layout.
///
/// Every registry carries a __manifest__ at its top-level named "dot.toml".
/// The manifest declares each dotfile the registry provides, keyed by a unique
/// name:
///
/// ```toml
/// [dotfiles.git]
/// src = "git/gitconfig"
/// dst = "~/.gitconfig"
/// os = ["linux", "macOS"]
/// ```
///
/// Entries are kept ordered by name.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RegistryManifest {
    /// Declared dotfiles keyed by name.
    #[serde(default)]
    pub dotfiles: BTreeMap<String, DotfileEntry>,
}

impl FromStr for RegistryManifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

/// Declared dotfile entry of registry manifest.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DotfileEntry {
    /// Path to dotfile source relative to registry root.
    ///
    /// Left empty when missing, so registry validation can report it along
    /// with every other invalid entry.
    #[serde(default)]
    pub src: String,

    /// Path dotfile is deployed to. Absolute, or starts with a tilde.
    #[serde(default)]
    pub dst: String,

    /// Supported operating systems. Empty means all of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
}

/// Lockfile layout.
///
/// The lockfile is the single source of truth about what dot manages. It
/// remembers which registry was adopted, and the last known good digest of
/// every dotfile destination that dot took over.
///
/// # Invariants
///
/// - Dot is set up if and only if the registry location is non-empty.
/// - A dotfile is managed if and only if its name is a key of the dotfile
///   table, regardless of whether a digest is recorded.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Root of the registry adopted by the last setup.
    #[serde(default)]
    pub registry_location: String,

    /// Managed dotfiles keyed by name.
    #[serde(default)]
    pub dotfiles: BTreeMap<String, DotfileState>,
}

impl Lockfile {
    /// Check if dot has adopted a registry.
    pub fn is_set_up(&self) -> bool {
        !self.registry_location.is_empty()
    }

    /// Check if dotfile is managed.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.dotfiles.contains_key(name)
    }

    /// Last applied digest of managed dotfile.
    ///
    /// Returns `None` both for unmanaged dotfiles, and for managed dotfiles
    /// whose destination did not exist when they were adopted.
    pub fn last_applied(&self, name: &str) -> Option<&Digest> {
        self.dotfiles
            .get(name)
            .and_then(|state| state.last_applied_digest.as_ref())
    }

    /// Record digest of managed dotfile, adopting it if needed.
    pub fn track(&mut self, name: impl Into<String>, digest: Option<Digest>) {
        self.dotfiles.insert(
            name.into(),
            DotfileState {
                last_applied_digest: digest,
            },
        );
    }
}

impl FromStr for Lockfile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        toml::de::from_str(data).map_err(ConfigError::Deserialize)
    }
}

impl Display for Lockfile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// State of managed dotfile.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DotfileState {
    /// Digest of destination when it was last known to be good.
    ///
    /// Absent when the destination did not exist at adoption. Written as an
    /// empty string so the entry itself never vanishes from the lockfile.
    #[serde(default, with = "empty_digest")]
    pub last_applied_digest: Option<Digest>,
}

mod empty_digest {
    use crate::digest::Digest;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(digest: &Option<Digest>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(digest.as_ref().map(Digest::as_str).unwrap_or_default())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Digest>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok((!raw.is_empty()).then(|| Digest::from_raw(raw)))
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
