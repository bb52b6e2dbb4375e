// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Content fingerprinting.
//!
//! Dot detects out-of-band edits to deployed dotfiles by comparing content
//! digests. The digest is only ever used as a cheap differ, so the exact hash
//! function is an implementation detail. Digests are rendered in the
//! canonical form `sha256:<hex>` so they survive a trip through the lockfile
//! unchanged.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{self, Read},
};

const PREFIX: &str = "sha256:";

/// Deterministic fingerprint of a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Fingerprint everything a reader yields.
    ///
    /// Takes ownership of the reader so the underlying handle is released
    /// once hashing finishes, no matter if it succeeded or not.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if reading fails part way through.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(format!("{PREFIX}{:x}", hasher.finalize())))
    }

    /// Fingerprint an in-memory buffer.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(format!("{PREFIX}{:x}", hasher.finalize()))
    }

    /// Wrap digest previously rendered by [`Display`].
    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Digest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}
