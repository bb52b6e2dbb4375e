// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile manager.
//!
//! Dot copies versioned dotfiles out of a user curated directory called a
//! __registry__ into their places on the file system, usually somewhere in
//! the user's home directory. Dot remembers the digest of every destination it
//! deploys to, so it can tell when a destination was edited by hand since,
//! and refuse to clobber those edits unless told otherwise.
//!
//! # See Also
//!
//! - [`Client`] for setting up and applying dotfiles.
//! - [`Registry`] for the layout of a registry.

pub mod client;
pub mod config;
pub mod digest;
pub mod path;
pub mod platform;
pub mod registry;
pub mod store;

pub use client::{ApplyPlan, Client, ClientBuilder, ClientError, PendingUpdate};
pub use config::{DotfileEntry, DotfileState, Lockfile, RegistryManifest};
pub use digest::Digest;
pub use platform::Platform;
pub use registry::{Dotfile, Registry, RegistryError, ValidationError, ValidationErrors};
pub use store::{LockfileStore, StoreError};
