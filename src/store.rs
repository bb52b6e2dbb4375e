// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lockfile persistence.
//!
//! Dot remembers what it manages through a __lockfile__ named "dot.lock"
//! inside its configuration directory. The lockfile is owned entirely by dot,
//! and should never be edited by hand.
//!
//! # Lockfile Lifecycle
//!
//! A missing lockfile is not an error. It simply means that dot has not been
//! set up yet, so an empty lockfile is handed out instead. Setup fills the
//! lockfile in one entry per adopted dotfile, and apply refreshes the digests
//! of the dotfiles it deploys. Nothing in dot ever deletes the lockfile.
//!
//! # Atomic Saves
//!
//! The whole lockfile is encoded in one pass, written to a sibling temporary
//! file, and then renamed over the old lockfile. Readers either see the old
//! lockfile or the new one, never a half written mixture of both.
//!
//! # See Also
//!
//! - [`Lockfile`]

use crate::config::{ConfigError, Lockfile};

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Name of lockfile inside configuration directory.
pub const LOCKFILE_NAME: &str = "dot.lock";

/// Handle to lockfile on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockfileStore {
    path: PathBuf,
}

impl LockfileStore {
    /// Construct new lockfile store inside configuration directory.
    ///
    /// Touches nothing on disk.
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            path: config_dir.as_ref().join(LOCKFILE_NAME),
        }
    }

    /// Path to lockfile.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Load lockfile.
    ///
    /// Yields an empty lockfile if none exists yet.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if existing lockfile cannot be read.
    /// - Return [`StoreError::Decode`] if existing lockfile is malformed.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<Lockfile> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no lockfile at {:?}, dot is not set up", self.path.display());
                return Ok(Lockfile::default());
            }
            Err(err) => {
                return Err(StoreError::Read {
                    source: err,
                    path: self.path.clone(),
                })
            }
        };

        data.parse::<Lockfile>().map_err(|err| StoreError::Decode {
            source: err,
            path: self.path.clone(),
        })
    }

    /// Save lockfile, replacing whatever was there before.
    ///
    /// Creates configuration directory if needed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Encode`] if lockfile cannot be serialized.
    /// - Return [`StoreError::Write`] if lockfile cannot be written.
    #[instrument(skip(self, lockfile), level = "debug")]
    pub fn save(&self, lockfile: &Lockfile) -> Result<()> {
        let data = toml::ser::to_string_pretty(lockfile)
            .map_err(|err| StoreError::Encode(ConfigError::Serialize(err)))?;

        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| StoreError::Write {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        // INVARIANT: Lockfile is never observed half written.
        //   - Write complete contents to temporary sibling first.
        //   - Rename temporary sibling over lockfile.
        let temp_path = self.path.with_file_name(format!(
            ".{LOCKFILE_NAME}.{}.tmp",
            std::process::id()
        ));
        let write_temp = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()
        };

        if let Err(err) = write_temp() {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Write {
                source: err,
                path: temp_path,
            });
        }

        fs::rename(&temp_path, &self.path).map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            StoreError::Write {
                source: err,
                path: self.path.clone(),
            }
        })?;
        debug!("saved lockfile {:?}", self.path.display());

        Ok(())
    }
}

/// Lockfile persistence error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Lockfile cannot be read.
    #[error("failed to read lockfile {:?}", .path.display())]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Lockfile is malformed.
    #[error("failed to parse lockfile {:?}", .path.display())]
    Decode {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },

    /// Lockfile cannot be serialized.
    #[error("failed to encode lockfile")]
    Encode(#[source] ConfigError),

    /// Lockfile cannot be written.
    #[error("failed to write lockfile {:?}", .path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
