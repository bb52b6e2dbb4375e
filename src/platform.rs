// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operating system identification.
//!
//! Dotfiles may restrict themselves to a set of operating systems. Manifests
//! name operating systems with identifiers like "linux", "darwin", or
//! "windows". Rust calls macOS "macos", so the current platform is translated
//! into the manifest scheme before any comparison happens. The manifest may
//! also spell macOS as "macOS", which is treated as an alias of "darwin".

use std::fmt::{Display, Formatter, Result as FmtResult};

const DARWIN: &str = "darwin";
const MACOS_ALIAS: &str = "macOS";

/// Platform identifier that dotfile eligibility is judged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform(String);

impl Platform {
    /// Construct platform from arbitrary identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Platform of the running process.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Self::new(DARWIN),
            os => Self::new(os),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Check if a listing of supported operating systems includes this platform.
    ///
    /// An empty listing supports every platform.
    pub fn supports(&self, supported: &[String]) -> bool {
        if supported.is_empty() {
            return true;
        }

        supported
            .iter()
            .any(|os| os == self.as_str() || (os == MACOS_ALIAS && self.as_str() == DARWIN))
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl Display for Platform {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}
