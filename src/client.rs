// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile synchronization engine.
//!
//! The [`Client`] is the one entry point through which dotfiles are managed.
//! It owns everything one invocation of dot needs: the lockfile loaded from
//! disk, the registry that lockfile points at, and the directories and
//! platform that dotfile paths are resolved against.
//!
//! # Setup
//!
//! Setup adopts a registry. Every dotfile of the registry that supports the
//! current platform is taken under management. If its destination already
//! exists, a backup of the destination is made, and its digest is recorded in
//! the lockfile. Dotfiles whose destination does not exist are recorded
//! without a digest. Setup can be run again at any time to adopt dotfiles
//! that were added to the registry since. Dotfiles already under management
//! are left alone.
//!
//! # Apply
//!
//! Apply deploys registry sources to their destinations. It works in two
//! phases. The first phase plans the deployment without writing anything:
//! every target must be under management, and every destination must still
//! match the digest recorded in the lockfile, otherwise someone edited it
//! behind dot's back. The second phase copies each outdated source to its
//! destination, and records the new digest.
//!
//! Forcing apply skips the modification check, and deploys every target no
//! matter if it is outdated or not.
//!
//! # Limitations
//!
//! A failure during the second phase of apply stops it immediately. Dotfiles
//! deployed before the failure stay deployed and recorded, there is no
//! rollback. The caller is told which dotfile failed so the remaining ones can
//! be retried.
//!
//! Nothing guards against two processes using the same lockfile at once. The
//! last one to save wins.

use crate::{
    config::Lockfile,
    digest::Digest,
    path::{backup_path, default_config_dir, expand_tilde, home_dir, NoWayHome},
    platform::Platform,
    registry::{Dotfile, Registry, RegistryError},
    store::{LockfileStore, StoreError},
};

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};

/// Configure and construct a [`Client`].
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    home_dir: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    platform: Option<Platform>,
}

impl ClientBuilder {
    /// Construct new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Home directory that tilde prefixed destinations expand against.
    ///
    /// Defaults to the home directory of the current user.
    pub fn with_home_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(path.into());
        self
    }

    /// Directory holding lockfile and backups.
    ///
    /// Defaults to `$HOME/.config/dot`.
    pub fn with_config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(path.into());
        self
    }

    /// Platform that dotfile eligibility is judged against.
    ///
    /// Defaults to the platform of the running process.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Construct client.
    ///
    /// Loads lockfile, and if dot is set up, the registry it points at. A
    /// registry that cannot be loaded does not fail construction, so setup
    /// can still switch dot over to another registry. Apply reports the
    /// failure instead.
    ///
    /// # Errors
    ///
    /// - Return [`ClientError::NoWayHome`] if no home directory was given,
    ///   and none can be determined.
    /// - Return [`ClientError::Store`] if lockfile cannot be loaded.
    pub fn build(self) -> Result<Client> {
        let home_dir = match self.home_dir {
            Some(path) => path,
            None => home_dir()?,
        };
        let config_dir = self
            .config_dir
            .unwrap_or_else(|| default_config_dir(&home_dir));
        let store = LockfileStore::new(&config_dir);
        let lockfile = store.load()?;

        let mut client = Client {
            lockfile,
            registry: None,
            store,
            home_dir,
            config_dir,
            platform: self.platform.unwrap_or_default(),
        };

        if client.is_set_up() {
            match client.load_registry() {
                Ok(registry) => client.registry = Some(registry),
                Err(err) => warn!("{err}"),
            }
        }

        Ok(client)
    }
}

/// Manage dotfiles of a registry.
#[derive(Debug)]
pub struct Client {
    lockfile: Lockfile,
    registry: Option<Registry>,
    store: LockfileStore,
    home_dir: PathBuf,
    config_dir: PathBuf,
    platform: Platform,
}

impl Client {
    /// Construct new client with default configuration.
    ///
    /// # Errors
    ///
    /// - Same as [`ClientBuilder::build`].
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Construct new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Check if dot has been set up with a registry.
    pub fn is_set_up(&self) -> bool {
        self.lockfile.is_set_up()
    }

    /// Registry currently in use, if dot is set up.
    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Lockfile as currently held in memory.
    pub fn lockfile(&self) -> &Lockfile {
        &self.lockfile
    }

    /// Directory holding lockfile and backups.
    pub fn config_dir(&self) -> &Path {
        self.config_dir.as_path()
    }

    /// Set up dot to manage dotfiles of registry.
    ///
    /// Adopts every dotfile of the registry that supports the current
    /// platform, and is not already under management. Existing destinations
    /// are backed up before they are adopted. Running setup again with the
    /// same registry only adopts dotfiles that are new to it.
    ///
    /// If dot is already set up with a different registry, setup refuses to
    /// switch registries unless forced.
    ///
    /// # Errors
    ///
    /// - Return [`ClientError::SetupConflict`] if dot is set up with a
    ///   different registry, and setup is not forced.
    /// - Return [`ClientError::LoadRegistry`] if registry is invalid.
    /// - Return [`ClientError::Io`] if a destination cannot be hashed or
    ///   backed up.
    /// - Return [`ClientError::Store`] if lockfile cannot be saved. The
    ///   registry is still adopted for the rest of this client's lifetime.
    #[instrument(skip(self, registry_dir), level = "debug")]
    pub fn setup(&mut self, registry_dir: impl AsRef<Path>, force: bool) -> Result<()> {
        let registry_dir = registry_dir.as_ref();
        let registry_dir =
            fs::canonicalize(registry_dir).unwrap_or_else(|_| registry_dir.to_path_buf());
        let location = registry_dir.to_string_lossy().into_owned();

        if self.lockfile.is_set_up() && self.lockfile.registry_location != location {
            if !force {
                return Err(ClientError::SetupConflict {
                    current: self.lockfile.registry_location.clone(),
                    requested: location,
                });
            }

            warn!(
                "replace registry {:?} with {:?}",
                self.lockfile.registry_location, location
            );
        }

        let registry = Registry::load(&registry_dir).map_err(|err| ClientError::LoadRegistry {
            source: err,
            path: registry_dir.clone(),
        })?;

        // INVARIANT: Lockfile held by client only changes once every
        // destination has been adopted.
        let mut lockfile = self.lockfile.clone();
        info!("back up existing dotfiles and record their digests");
        for dotfile in self.eligible(registry.list(NO_NAMES)?) {
            if lockfile.is_tracked(&dotfile.name) {
                debug!("dotfile {} already set up, skipping", dotfile.name);
                continue;
            }

            let dst = expand_tilde(&dotfile.dst, &self.home_dir);
            let Some(digest) = digest_file(&dst)? else {
                debug!("{:?} does not exist, nothing to back up", dst.display());
                lockfile.track(&dotfile.name, None);
                continue;
            };

            let backup = backup_path(&self.config_dir, &dotfile.src);
            debug!("back up {:?} to {:?}", dst.display(), backup.display());
            copy_file(&dst, &backup)?;

            lockfile.track(&dotfile.name, Some(digest));
        }
        info!("finished backing up dotfiles");

        lockfile.registry_location = location;
        self.lockfile = lockfile;
        self.registry = Some(registry);
        self.store.save(&self.lockfile)?;

        Ok(())
    }

    /// Apply registry sources to their destinations.
    ///
    /// Applies the named dotfiles, or every managed dotfile if no names are
    /// given. Dotfiles that do not support the current platform are skipped.
    ///
    /// # Errors
    ///
    /// - Same as [`Client::plan_apply`], in which case nothing was written.
    /// - Return [`ClientError::PartialApply`] if deployment of a dotfile
    ///   fails. Dotfiles deployed before it remain deployed and recorded.
    /// - Return [`ClientError::Store`] if lockfile cannot be saved.
    #[instrument(skip(self, names), level = "debug")]
    pub fn apply<I, S>(&mut self, force: bool, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.registry.is_none() {
            self.registry = Some(self.load_registry()?);
        }

        let plan = self.plan_apply(force, names)?;
        self.execute(plan)
    }

    /// Plan application of registry sources without writing anything.
    ///
    /// Runs every safety check of [`Client::apply`] over the whole target
    /// set, and lists the dotfiles that need to be deployed.
    ///
    /// # Errors
    ///
    /// - Return [`ClientError::Uninitialized`] if dot is not set up.
    /// - Return [`ClientError::LoadRegistry`] if registry of lockfile cannot
    ///   be loaded.
    /// - Return [`ClientError::Registry`] if requested names are not declared
    ///   by the registry.
    /// - Return [`ClientError::NotSetUp`] naming every requested dotfile that
    ///   is not under management.
    /// - Return [`ClientError::ManuallyModified`] if a destination no longer
    ///   matches its recorded digest, and apply is not forced.
    /// - Return [`ClientError::Io`] if a destination cannot be hashed.
    pub fn plan_apply<I, S>(&self, force: bool, names: I) -> Result<ApplyPlan>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let loaded;
        let registry = match self.registry.as_ref() {
            Some(registry) => registry,
            None => {
                loaded = self.load_registry()?;
                &loaded
            }
        };
        let names = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect::<Vec<_>>();

        let targets = if names.is_empty() {
            self.eligible(registry.list(NO_NAMES)?)
                .into_iter()
                .filter(|dotfile| {
                    let tracked = self.lockfile.is_tracked(&dotfile.name);
                    if !tracked {
                        warn!("dotfile {} is not set up, run setup to manage it", dotfile.name);
                    }
                    tracked
                })
                .collect::<Vec<_>>()
        } else {
            self.eligible(registry.list(&names)?)
        };

        self.check_modified(&targets, force)?;
        self.find_outdated(registry, &targets, force)
    }

    /// Deploy every update of a plan.
    fn execute(&mut self, plan: ApplyPlan) -> Result<()> {
        let registry = self.registry.as_ref().ok_or(ClientError::Uninitialized)?;

        let mut applied = Vec::new();
        let mut failure = None;
        for update in plan.updates {
            info!("apply changes to dotfile {}", update.name);
            if let Err(err) = deploy(registry, &update) {
                failure = Some((update.name, err));
                break;
            }

            self.lockfile.track(&update.name, Some(update.digest));
            applied.push(update.name);
        }
        info!("finished applying changes to dotfiles");

        // INVARIANT: Record whatever got deployed, even after a failure.
        let saved = self.store.save(&self.lockfile);
        match failure {
            Some((name, source)) => {
                if let Err(err) = saved {
                    error!("{err:?}");
                }

                Err(ClientError::PartialApply {
                    name,
                    applied,
                    source: Box::new(source),
                })
            }
            None => Ok(saved?),
        }
    }

    /// Load registry recorded in lockfile.
    fn load_registry(&self) -> Result<Registry> {
        if !self.is_set_up() {
            return Err(ClientError::Uninitialized);
        }

        let root = PathBuf::from(&self.lockfile.registry_location);
        debug!("load registry {:?} of lockfile", root.display());
        Registry::load(&root).map_err(|err| ClientError::LoadRegistry { source: err, path: root })
    }

    /// Keep dotfiles that support the current platform.
    fn eligible<'r>(&self, dotfiles: Vec<&'r Dotfile>) -> Vec<&'r Dotfile> {
        dotfiles
            .into_iter()
            .filter(|dotfile| {
                let supported = self.platform.supports(&dotfile.os);
                if !supported {
                    debug!(
                        "dotfile {} does not support {}, skipping",
                        dotfile.name, self.platform
                    );
                }
                supported
            })
            .collect()
    }

    /// First phase of apply: every target must be managed and unmodified.
    fn check_modified(&self, targets: &[&Dotfile], force: bool) -> Result<()> {
        let untracked = targets
            .iter()
            .filter(|dotfile| !self.lockfile.is_tracked(&dotfile.name))
            .map(|dotfile| dotfile.name.clone())
            .collect::<Vec<_>>();
        if !untracked.is_empty() {
            return Err(ClientError::NotSetUp { names: untracked });
        }

        debug!("check if dotfiles have been modified");
        for dotfile in targets {
            let dst = expand_tilde(&dotfile.dst, &self.home_dir);
            let Some(digest) = digest_file(&dst)? else {
                debug!("{:?} does not exist, will be created", dst.display());
                continue;
            };

            if self.lockfile.last_applied(&dotfile.name) == Some(&digest) {
                debug!("no modifications detected to {:?}", dst.display());
                continue;
            }

            if !force {
                return Err(ClientError::ManuallyModified {
                    name: dotfile.name.clone(),
                    path: dst,
                });
            }

            warn!("{:?} was manually modified, but apply is forced", dst.display());
        }

        Ok(())
    }

    /// Second phase of apply: find targets whose source moved on.
    ///
    /// The recorded digest of a destination doubles as the marker of the
    /// source it was last deployed from, since both are identical after a
    /// successful apply.
    fn find_outdated(
        &self,
        registry: &Registry,
        targets: &[&Dotfile],
        force: bool,
    ) -> Result<ApplyPlan> {
        debug!("check if dotfiles are outdated");
        let mut updates = Vec::new();
        for dotfile in targets {
            let digest = Digest::from_reader(registry.open(&dotfile.name)?).map_err(|err| {
                ClientError::Io {
                    action: "hash",
                    source: err,
                    path: registry.source_path(&dotfile.name).unwrap_or_default(),
                }
            })?;

            if force || self.lockfile.last_applied(&dotfile.name) != Some(&digest) {
                debug!("dotfile {} is out of date", dotfile.name);
                updates.push(PendingUpdate {
                    name: dotfile.name.clone(),
                    destination: expand_tilde(&dotfile.dst, &self.home_dir),
                    digest,
                });
            } else {
                debug!("dotfile {} is up to date", dotfile.name);
            }
        }

        Ok(ApplyPlan { updates })
    }
}

const NO_NAMES: [&str; 0] = [];

/// Deployment work decided on by [`Client::plan_apply`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplyPlan {
    updates: Vec<PendingUpdate>,
}

impl ApplyPlan {
    /// Dotfiles to deploy, in deployment order.
    pub fn updates(&self) -> &[PendingUpdate] {
        self.updates.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Dotfile scheduled for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Name of dotfile.
    pub name: String,

    /// Expanded destination path.
    pub destination: PathBuf,

    /// Digest of source that will be deployed.
    pub digest: Digest,
}

/// Hash file, treating a missing file as nothing to hash.
fn digest_file(path: &Path) -> Result<Option<Digest>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ClientError::io("open", path, err)),
    };

    Digest::from_reader(file)
        .map(Some)
        .map_err(|err| ClientError::io("hash", path, err))
}

/// Copy file byte for byte, keeping its permission bits.
fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        mkdirp::mkdirp(parent).map_err(|err| ClientError::io("create directory", parent, err))?;
    }

    fs::copy(src, dst).map_err(|err| ClientError::io("copy", dst, err))?;

    Ok(())
}

/// Copy registry source of pending update to its destination.
fn deploy(registry: &Registry, update: &PendingUpdate) -> Result<()> {
    let dst = update.destination.as_path();
    if let Some(parent) = dst.parent() {
        mkdirp::mkdirp(parent).map_err(|err| ClientError::io("create directory", parent, err))?;
    }

    let mut source = registry.open(&update.name)?;
    let permissions = source
        .metadata()
        .map_err(|err| {
            let path = registry.source_path(&update.name).unwrap_or_default();
            ClientError::io("stat", path, err)
        })?
        .permissions();

    let mut target = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)
        .map_err(|err| ClientError::io("open", dst, err))?;
    io::copy(&mut source, &mut target).map_err(|err| ClientError::io("write", dst, err))?;
    target
        .set_permissions(permissions)
        .map_err(|err| ClientError::io("set permissions of", dst, err))?;
    debug!("deployed dotfile {} to {:?}", update.name, dst.display());

    Ok(())
}

/// Dotfile synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Dot is set up with another registry.
    #[error("already set up with registry {current:?}, refusing to switch to {requested:?} without force")]
    SetupConflict { current: String, requested: String },

    /// Dot has not been set up at all.
    #[error("dot is not set up, run setup first")]
    Uninitialized,

    /// Requested dotfiles are not under management.
    #[error("dotfile not set up: {}", .names.join(", "))]
    NotSetUp { names: Vec<String> },

    /// Destination changed since dot last deployed it.
    #[error("{:?} was manually modified", .path.display())]
    ManuallyModified { name: String, path: PathBuf },

    /// Deployment stopped part way through.
    #[error("failed to apply changes to {name}, retry the remaining dotfiles")]
    PartialApply {
        name: String,
        applied: Vec<String>,
        #[source]
        source: Box<ClientError>,
    },

    /// Registry cannot be loaded.
    #[error("failed to load registry {:?}", .path.display())]
    LoadRegistry {
        #[source]
        source: RegistryError,
        path: PathBuf,
    },

    /// Registry lookups fail.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Lockfile persistence fails.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Home directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// File system operation fails.
    #[error("failed to {action} {:?}", .path.display())]
    Io {
        action: &'static str,
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl ClientError {
    fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            action,
            source,
            path: path.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MANIFEST_NAME;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Fixture {
        registry: TempDir,
        home: TempDir,
    }

    impl Fixture {
        fn new(manifest: &str, sources: &[(&str, &str)]) -> anyhow::Result<Self> {
            let registry = tempfile::tempdir()?;
            fs::write(registry.path().join(MANIFEST_NAME), manifest)?;
            for (path, contents) in sources {
                let path = registry.path().join(path);
                mkdirp::mkdirp(path.parent().unwrap())?;
                fs::write(path, contents)?;
            }

            Ok(Self {
                registry,
                home: tempfile::tempdir()?,
            })
        }

        fn client(&self, platform: &str) -> anyhow::Result<Client> {
            Ok(Client::builder()
                .with_home_dir(self.home.path())
                .with_platform(Platform::new(platform))
                .build()?)
        }

        fn home_file(&self, path: &str) -> PathBuf {
            self.home.path().join(path)
        }
    }

    fn git_and_vim() -> anyhow::Result<Fixture> {
        Fixture::new(
            indoc! {r#"
                [dotfiles.git]
                src = "git/gitconfig"
                dst = "~/.gitconfig"

                [dotfiles.vim]
                src = "vim/vimrc"
                dst = "~/.vim/vimrc"
                os = ["macOS"]
            "#},
            &[
                ("git/gitconfig", "[pull]\n\tff = only\n"),
                ("vim/vimrc", "set number\n"),
            ],
        )
    }

    #[test]
    fn setup_skips_unsupported_platform() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        assert!(client.lockfile().is_tracked("git"));
        assert!(!client.lockfile().is_tracked("vim"));

        let mut client = fixture.client("darwin")?;
        client.setup(fixture.registry.path(), false)?;
        assert!(client.lockfile().is_tracked("vim"));

        Ok(())
    }

    #[test]
    fn setup_conflict_leaves_state_alone() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;
        let other = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        let before = client.lockfile().clone();

        let result = client.setup(other.registry.path(), false);
        assert!(matches!(result, Err(ClientError::SetupConflict { .. })));
        assert_eq!(client.lockfile(), &before);
        assert_eq!(fixture.client("linux")?.lockfile(), &before);

        client.setup(other.registry.path(), true)?;
        assert_eq!(
            PathBuf::from(&client.lockfile().registry_location),
            fs::canonicalize(other.registry.path())?
        );

        Ok(())
    }

    #[test]
    fn setup_invalid_registry_mutates_nothing() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            indoc! {r#"
                [dotfiles.git]
                src = "git/gitconfig"
                dst = ".gitconfig"
            "#},
            &[],
        )?;

        let mut client = fixture.client("linux")?;
        let result = client.setup(fixture.registry.path(), false);
        assert!(matches!(result, Err(ClientError::LoadRegistry { .. })));
        assert!(!client.is_set_up());
        assert!(!client.config_dir().join("dot.lock").exists());

        Ok(())
    }

    #[test]
    fn setup_keeps_adoption_when_lockfile_cannot_be_saved() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;
        let config_dir = fixture.home.path().join("dot");

        let mut client = Client::builder()
            .with_home_dir(fixture.home.path())
            .with_config_dir(&config_dir)
            .with_platform(Platform::new("linux"))
            .build()?;

        // Configuration directory cannot be created over a regular file.
        fs::write(&config_dir, "not a directory")?;

        let result = client.setup(fixture.registry.path(), false);
        assert!(matches!(result, Err(ClientError::Store(StoreError::Write { .. }))));
        assert!(client.is_set_up());
        assert!(client.registry().is_some());
        assert!(client.lockfile().is_tracked("git"));

        Ok(())
    }

    #[test]
    fn apply_before_setup_is_uninitialized() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        let result = client.apply(false, NO_NAMES);
        assert!(matches!(result, Err(ClientError::Uninitialized)));
        assert!(!fixture.home_file(".gitconfig").exists());

        Ok(())
    }

    #[test]
    fn apply_names_every_untracked_dotfile() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            indoc! {r#"
                [dotfiles.git]
                src = "git/gitconfig"
                dst = "~/.gitconfig"
            "#},
            &[("git/gitconfig", "[pull]\n")],
        )?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;

        // Registry grows after setup.
        fs::write(
            fixture.registry.path().join(MANIFEST_NAME),
            indoc! {r#"
                [dotfiles.git]
                src = "git/gitconfig"
                dst = "~/.gitconfig"

                [dotfiles.tmux]
                src = "tmux.conf"
                dst = "~/.tmux.conf"

                [dotfiles.zsh]
                src = "zshrc"
                dst = "~/.zshrc"
            "#},
        )?;
        fs::write(fixture.registry.path().join("tmux.conf"), "set -g mouse on\n")?;
        fs::write(fixture.registry.path().join("zshrc"), "export EDITOR=vim\n")?;

        let mut client = fixture.client("linux")?;
        match client.apply(false, ["git", "tmux", "zsh"]) {
            Err(ClientError::NotSetUp { names }) => assert_eq!(names, vec!["tmux", "zsh"]),
            other => panic!("expected not set up error, got {other:?}"),
        }
        assert!(!fixture.home_file(".gitconfig").exists());
        assert!(!fixture.home_file(".tmux.conf").exists());

        // Applying everything only touches managed dotfiles.
        client.apply(false, NO_NAMES)?;
        assert!(fixture.home_file(".gitconfig").exists());
        assert!(!fixture.home_file(".zshrc").exists());

        Ok(())
    }

    #[test]
    fn apply_unknown_name_fails() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        let result = client.apply(false, ["git", "missing"]);
        assert!(matches!(
            result,
            Err(ClientError::Registry(RegistryError::NotFound { .. }))
        ));

        Ok(())
    }

    #[test]
    fn plan_apply_writes_nothing() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;
        fs::write(fixture.home_file(".gitconfig"), "[user]\n\tname = blah\n")?;

        let mut client = fixture.client("darwin")?;
        client.setup(fixture.registry.path(), false)?;
        let lockfile = client.lockfile().clone();

        let plan = client.plan_apply(false, NO_NAMES)?;
        let result = plan
            .updates()
            .iter()
            .map(|update| (update.name.as_str(), update.destination.clone()))
            .collect::<Vec<_>>();
        let expect = vec![
            ("git", fixture.home_file(".gitconfig")),
            ("vim", fixture.home_file(".vim/vimrc")),
        ];
        assert_eq!(result, expect);
        assert_eq!(
            plan.updates()[0].digest,
            Digest::from_bytes("[pull]\n\tff = only\n")
        );

        assert_eq!(
            fs::read_to_string(fixture.home_file(".gitconfig"))?,
            "[user]\n\tname = blah\n"
        );
        assert!(!fixture.home_file(".vim").exists());
        assert_eq!(client.lockfile(), &lockfile);

        Ok(())
    }

    #[test]
    fn apply_skips_up_to_date_dotfiles() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        client.apply(false, NO_NAMES)?;

        assert!(client.plan_apply(false, NO_NAMES)?.is_empty());
        assert_eq!(client.plan_apply(true, NO_NAMES)?.updates().len(), 1);

        fs::write(
            fixture.registry.path().join("git/gitconfig"),
            "[pull]\n\trebase = true\n",
        )?;
        assert_eq!(client.plan_apply(false, ["git"])?.updates().len(), 1);

        Ok(())
    }

    #[test]
    fn apply_refuses_modified_destination() -> anyhow::Result<()> {
        let fixture = git_and_vim()?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        client.apply(false, NO_NAMES)?;

        fs::write(fixture.home_file(".gitconfig"), "edited by hand\n")?;
        fs::write(
            fixture.registry.path().join("git/gitconfig"),
            "[pull]\n\trebase = true\n",
        )?;

        match client.apply(false, NO_NAMES) {
            Err(ClientError::ManuallyModified { name, path }) => {
                assert_eq!(name, "git");
                assert_eq!(path, fixture.home_file(".gitconfig"));
            }
            other => panic!("expected manually modified error, got {other:?}"),
        }
        assert_eq!(
            fs::read_to_string(fixture.home_file(".gitconfig"))?,
            "edited by hand\n"
        );

        client.apply(true, NO_NAMES)?;
        assert_eq!(
            fs::read_to_string(fixture.home_file(".gitconfig"))?,
            "[pull]\n\trebase = true\n"
        );
        assert_eq!(
            client.lockfile().last_applied("git"),
            Some(&Digest::from_bytes("[pull]\n\trebase = true\n"))
        );

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn apply_keeps_source_permissions() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new(
            indoc! {r#"
                [dotfiles.hook]
                src = "bin/hook"
                dst = "~/.local/bin/hook"
            "#},
            &[("bin/hook", "#!/bin/sh\necho hook\n")],
        )?;
        let source = fixture.registry.path().join("bin/hook");
        fs::set_permissions(&source, fs::Permissions::from_mode(0o755))?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;
        client.apply(false, NO_NAMES)?;

        let mode = fs::metadata(fixture.home_file(".local/bin/hook"))?
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn apply_failure_keeps_earlier_progress() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            indoc! {r#"
                [dotfiles.a]
                src = "a"
                dst = "~/a.conf"

                [dotfiles.b]
                src = "b"
                dst = "~/b.conf"
            "#},
            &[("a", "alpha\n"), ("b", "beta\n")],
        )?;

        let mut client = fixture.client("linux")?;
        client.setup(fixture.registry.path(), false)?;

        // Dangling link into a missing directory reads as absent, but cannot
        // be written through.
        std::os::unix::fs::symlink(
            fixture.home_file("missing/b.conf"),
            fixture.home_file("b.conf"),
        )?;

        match client.apply(false, NO_NAMES) {
            Err(ClientError::PartialApply { name, applied, .. }) => {
                assert_eq!(name, "b");
                assert_eq!(applied, vec!["a"]);
            }
            other => panic!("expected partial apply error, got {other:?}"),
        }

        let reloaded = fixture.client("linux")?;
        assert_eq!(
            reloaded.lockfile().last_applied("a"),
            Some(&Digest::from_bytes("alpha\n"))
        );
        assert_eq!(reloaded.lockfile().last_applied("b"), None);

        Ok(())
    }
}
