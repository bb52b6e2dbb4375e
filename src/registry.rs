// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile registry.
//!
//! A __registry__ is a directory of dotfile sources together with a manifest
//! named "dot.toml" at its top-level. The manifest declares every dotfile the
//! registry provides, where its source lives inside the registry, where it
//! should be deployed, and which operating systems it supports.
//!
//! Registries are read-only. Dot never writes into a registry, it only copies
//! sources out of it.
//!
//! # Validation
//!
//! A registry is validated in full when it is loaded. Every declared dotfile
//! is checked, and every problem found is reported together in one
//! [`ValidationErrors`] value instead of stopping at the first bad entry. A
//! registry that loads successfully is therefore known to be valid as a whole.
//!
//! # See Also
//!
//! - [`RegistryManifest`]

use crate::{
    config::{DotfileEntry, RegistryManifest},
    path::{is_safe_relative, is_valid_destination},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Name of registry manifest at registry root.
pub const MANIFEST_NAME: &str = "dot.toml";

/// Dotfile declared by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dotfile {
    /// Unique name of dotfile in its registry.
    pub name: String,

    /// Slash separated path to source relative to registry root.
    pub src: String,

    /// Deployment path, absolute or tilde prefixed.
    pub dst: String,

    /// Supported operating systems. Empty means all of them.
    pub os: Vec<String>,
}

impl Dotfile {
    fn new(name: impl Into<String>, entry: DotfileEntry) -> Self {
        Self {
            name: name.into(),
            src: entry.src,
            dst: entry.dst,
            os: entry.os,
        }
    }
}

/// Read-only view of a validated registry.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    dotfiles: Vec<Dotfile>,
}

impl Registry {
    /// Load and validate registry at target root.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::ReadManifest`] if manifest cannot be read.
    /// - Return [`RegistryError::Manifest`] if manifest cannot be decoded.
    /// - Return [`RegistryError::Invalid`] if any declared dotfile fails
    ///   validation. All failures across the manifest are included.
    #[instrument(skip(root), level = "debug")]
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_NAME);
        debug!("load registry manifest {:?}", manifest_path.display());

        let data = fs::read_to_string(&manifest_path).map_err(|err| RegistryError::ReadManifest {
            source: err,
            path: manifest_path.clone(),
        })?;
        let manifest = data
            .parse::<RegistryManifest>()
            .map_err(|err| RegistryError::Manifest {
                source: err,
                path: manifest_path.clone(),
            })?;

        let mut errors = ValidationErrors(Vec::new());
        let mut dotfiles = Vec::with_capacity(manifest.dotfiles.len());
        for (name, entry) in manifest.dotfiles {
            let messages = validate_entry(&root, &entry);
            if messages.is_empty() {
                dotfiles.push(Dotfile::new(name, entry));
            } else {
                errors.0.push(ValidationError { name, messages });
            }
        }

        if !errors.is_empty() {
            return Err(RegistryError::Invalid(errors));
        }

        // INVARIANT: Dotfiles are sorted by name.
        //   - Manifest entries come out of an ordered map already.
        Ok(Self { root, dotfiles })
    }

    /// List declared dotfiles.
    ///
    /// Lists every declared dotfile sorted by name if no names are given.
    /// Otherwise, lists exactly the named dotfiles in the order requested.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::NotFound`] naming every requested dotfile
    ///   that the registry does not declare.
    pub fn list<I, S>(&self, names: I) -> Result<Vec<&Dotfile>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names.into_iter().collect::<Vec<_>>();
        if names.is_empty() {
            return Ok(self.dotfiles.iter().collect());
        }

        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.get(name.as_ref()) {
                Some(dotfile) => found.push(dotfile),
                None => missing.push(name.as_ref().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(RegistryError::NotFound { names: missing });
        }

        Ok(found)
    }

    /// Get declared dotfile by name.
    pub fn get(&self, name: &str) -> Option<&Dotfile> {
        self.dotfiles
            .binary_search_by(|dotfile| dotfile.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.dotfiles[index])
    }

    /// Absolute path to source of declared dotfile.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::NotFound`] if dotfile is not declared.
    pub fn source_path(&self, name: &str) -> Result<PathBuf> {
        self.get(name)
            .map(|dotfile| source_in(&self.root, &dotfile.src))
            .ok_or_else(|| RegistryError::NotFound {
                names: vec![name.to_string()],
            })
    }

    /// Open source of declared dotfile for reading.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::NotFound`] if dotfile is not declared.
    /// - Return [`RegistryError::OpenSource`] if source cannot be opened.
    pub fn open(&self, name: &str) -> Result<File> {
        let path = self.source_path(name)?;
        File::open(&path).map_err(|err| RegistryError::OpenSource { source: err, path })
    }
}

fn source_in(root: &Path, src: &str) -> PathBuf {
    src.split('/').fold(root.to_path_buf(), |path, elem| path.join(elem))
}

fn validate_entry(root: &Path, entry: &DotfileEntry) -> Vec<String> {
    let mut messages = Vec::new();

    if is_safe_relative(&entry.src) {
        match fs::metadata(source_in(root, &entry.src)) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => messages.push(format!("{:?} is not a regular file", entry.src)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                messages.push(format!("{:?} does not exist", entry.src))
            }
            Err(err) => messages.push(format!("failed to stat {:?}: {err}", entry.src)),
        }
    } else {
        messages.push(format!("src path {:?} is invalid", entry.src));
    }

    if !is_valid_destination(&entry.dst) {
        messages.push(format!("dst path {:?} must be absolute or start with '~/'", entry.dst));
    }

    messages
}

/// Validation failures of one declared dotfile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {}", .messages.join(", "))]
pub struct ValidationError {
    /// Name of dotfile that failed validation.
    pub name: String,

    /// Every reason the dotfile failed validation.
    pub messages: Vec<String>,
}

/// Validation failures across a whole registry manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                fmt.write_str("\n")?;
            }
            write!(fmt, "{error}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registry manifest cannot be read.
    #[error("failed to read registry manifest {:?}", .path.display())]
    ReadManifest {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Registry manifest cannot be decoded.
    #[error("failed to decode registry manifest {:?}", .path.display())]
    Manifest {
        #[source]
        source: crate::config::ConfigError,
        path: PathBuf,
    },

    /// One or more declared dotfiles are invalid.
    #[error("invalid registry:\n{0}")]
    Invalid(ValidationErrors),

    /// Requested dotfiles are not declared.
    #[error("dotfile not found: {}", .names.join(", "))]
    NotFound { names: Vec<String> },

    /// Dotfile source cannot be opened.
    #[error("failed to open dotfile source {:?}", .path.display())]
    OpenSource {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
