// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to dot's configuration directory.
///
/// Uses `$HOME/.config/dot` relative to the given home directory. Does not
/// check if the path returned actually exists.
pub fn default_config_dir(home: impl AsRef<Path>) -> PathBuf {
    home.as_ref().join(".config").join("dot")
}

/// Expand leading tilde of a destination path against a home directory.
///
/// Only "~" and "~/..." are expanded. Anything else is returned untouched.
pub fn expand_tilde(path: &str, home: impl AsRef<Path>) -> PathBuf {
    let home = home.as_ref().to_string_lossy();
    let expanded = shellexpand::tilde_with_context(path, || Some(home.as_ref()));
    PathBuf::from(expanded.as_ref())
}

/// Check if destination path is acceptable to a registry.
///
/// Must be absolute, or start with a tilde that [`expand_tilde`] knows how to
/// expand.
pub fn is_valid_destination(path: &str) -> bool {
    path == "~" || path.starts_with("~/") || Path::new(path).is_absolute()
}

/// Check if source path is a safe relative path.
///
/// A safe relative path is slash separated, not rooted, and made of non-empty
/// elements that are neither "." nor "..". It can never escape the directory
/// it is joined onto.
pub fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|elem| !elem.is_empty() && elem != "." && elem != ".." && !elem.contains('\\'))
}

/// Determine where the backup of a dotfile destination is kept.
///
/// Backups mirror the layout of the registry sources beneath
/// `$config_dir/backups`, with a ".bak" extension appended.
pub fn backup_path(config_dir: impl AsRef<Path>, source: &str) -> PathBuf {
    let mut path = config_dir.as_ref().join("backups").into_os_string();
    for elem in source.split('/') {
        path.push(std::path::MAIN_SEPARATOR_STR);
        path.push(elem);
    }
    path.push(".bak");
    PathBuf::from(path)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test_case("git/gitconfig", true; "nested file")]
    #[test_case("zshrc", true; "top level file")]
    #[test_case("", false; "empty")]
    #[test_case("/etc/passwd", false; "rooted")]
    #[test_case("../git/gitconfig", false; "parent traversal")]
    #[test_case("git/../../gitconfig", false; "inner traversal")]
    #[test_case("./zshrc", false; "current dir element")]
    #[test_case("git//gitconfig", false; "empty element")]
    #[test_case("git/", false; "trailing slash")]
    #[test]
    fn safe_relative_paths(path: &str, expect: bool) {
        assert_eq!(is_safe_relative(path), expect);
    }

    #[test_case("~/.gitconfig", true; "tilde prefixed")]
    #[test_case("~", true; "bare tilde")]
    #[test_case("/etc/hosts", true; "absolute")]
    #[test_case("home/.zshrc", false; "relative")]
    #[test_case("~bob/.zshrc", false; "other user tilde")]
    #[test]
    fn destination_paths(path: &str, expect: bool) {
        assert_eq!(is_valid_destination(path), expect);
    }

    #[test]
    fn expand_tilde_against_home() {
        let home = PathBuf::from("/home/blah");
        assert_eq!(
            expand_tilde("~/.gitconfig", &home),
            PathBuf::from("/home/blah/.gitconfig")
        );
        assert_eq!(expand_tilde("~", &home), PathBuf::from("/home/blah"));
        assert_eq!(expand_tilde("/etc/hosts", &home), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn backup_path_mirrors_source() {
        let result = backup_path("/home/blah/.config/dot", "git/gitconfig");
        let expect = PathBuf::from("/home/blah/.config/dot")
            .join("backups")
            .join("git")
            .join("gitconfig.bak");
        assert_eq!(result, expect);
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn home_dir_from_environment() -> anyhow::Result<()> {
        assert_eq!(home_dir()?, PathBuf::from("/home/blah"));
        assert_eq!(
            default_config_dir(home_dir()?),
            PathBuf::from("/home/blah/.config/dot")
        );
        Ok(())
    }
}
