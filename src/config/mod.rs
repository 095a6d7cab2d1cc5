//! Configuration management.
//!
//! This module resolves where docsync keeps its database and which
//! repository directory it mirrors pages into.
//!
//! # Architecture
//!
//! - **Database**: single global database at `~/.docsync/data/docsync.db`
//! - **Repository**: one Markdown mirror directory, recorded in the
//!   database's settings table by `docsync init`
//!
//! Every value resolves in the same order: CLI flag, environment variable,
//! stored setting, built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::git::{GitCli, DEFAULT_GIT_TIMEOUT};
use crate::storage::SqliteStorage;

/// Environment variable overriding the database path.
pub const ENV_DB: &str = "DOCSYNC_DB";
/// Environment variable overriding the repository root.
pub const ENV_REPO: &str = "DOCSYNC_REPO";
/// Environment variable overriding the remote URL.
pub const ENV_REMOTE: &str = "DOCSYNC_REMOTE";
/// Environment variable overriding the actor name.
pub const ENV_ACTOR: &str = "DOCSYNC_ACTOR";
/// Environment variable overriding the git timeout, in seconds.
pub const ENV_GIT_TIMEOUT: &str = "DOCSYNC_GIT_TIMEOUT";

/// Settings key for the repository root.
pub const SETTING_REPO_PATH: &str = "repo_path";
/// Settings key for the remote URL used to create `origin`.
pub const SETTING_REMOTE_URL: &str = "remote_url";

/// Repository and gateway settings for one sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Directory the page tree is mirrored into.
    pub repo_root: PathBuf,
    /// Remote to create as `origin` on first push.
    pub remote_url: Option<String>,
    /// Bound on each git invocation.
    pub git_timeout: Duration,
}

impl SyncConfig {
    /// Config for a repository root with no remote and the default timeout.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            remote_url: None,
            git_timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Resolve the full config from flags, environment and stored settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no repository root can be determined, or a
    /// database error if settings cannot be read.
    pub fn resolve(
        explicit_repo: Option<&Path>,
        explicit_remote: Option<&str>,
        storage: &SqliteStorage,
    ) -> Result<Self> {
        let repo_root = resolve_repo_root(explicit_repo, storage)?;
        let remote_url = resolve_remote_url(explicit_remote, storage)?;

        let git_timeout = match env_non_empty(ENV_GIT_TIMEOUT) {
            Some(raw) => raw.parse().map(Duration::from_secs).map_err(|_| {
                Error::Config(format!("{ENV_GIT_TIMEOUT} must be a number of seconds, got '{raw}'"))
            })?,
            None => DEFAULT_GIT_TIMEOUT,
        };

        Ok(Self {
            repo_root,
            remote_url,
            git_timeout,
        })
    }

    /// Gateway for this repository.
    #[must_use]
    pub fn gateway(&self) -> GitCli {
        GitCli::new(&self.repo_root)
            .with_remote_url(self.remote_url.clone())
            .with_timeout(self.git_timeout)
    }
}

/// Get the global docsync directory location (`~/.docsync/`).
#[must_use]
pub fn global_docsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".docsync"))
}

/// Default repository root (`~/.docsync/repo`).
#[must_use]
pub fn default_repo_root() -> Option<PathBuf> {
    global_docsync_dir().map(|dir| dir.join("repo"))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `DOCSYNC_DB` environment variable
/// 3. Global location: `~/.docsync/data/docsync.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Some(db_path) = env_non_empty(ENV_DB) {
        return Some(PathBuf::from(db_path));
    }

    global_docsync_dir().map(|dir| dir.join("data").join("docsync.db"))
}

/// Resolve the repository root.
///
/// Priority: explicit flag, `DOCSYNC_REPO`, the `repo_path` setting, then
/// `~/.docsync/repo`.
///
/// # Errors
///
/// Returns `Config` if no candidate exists, or a database error.
pub fn resolve_repo_root(explicit: Option<&Path>, storage: &SqliteStorage) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env_non_empty(ENV_REPO) {
        return Ok(PathBuf::from(path));
    }
    if let Some(path) = storage.get_setting(SETTING_REPO_PATH)? {
        return Ok(PathBuf::from(path));
    }
    default_repo_root().ok_or_else(|| {
        Error::Config("cannot determine a repository root; pass --repo".to_string())
    })
}

/// Resolve the remote URL: explicit flag, `DOCSYNC_REMOTE`, then the
/// `remote_url` setting.
///
/// # Errors
///
/// Returns an error if settings cannot be read.
pub fn resolve_remote_url(explicit: Option<&str>, storage: &SqliteStorage) -> Result<Option<String>> {
    if let Some(url) = explicit.filter(|u| !u.trim().is_empty()) {
        return Ok(Some(url.to_string()));
    }
    if let Some(url) = env_non_empty(ENV_REMOTE) {
        return Ok(Some(url));
    }
    storage.get_setting(SETTING_REMOTE_URL)
}

/// Get the default actor name.
///
/// Priority:
/// 1. `DOCSYNC_ACTOR` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Some(actor) = env_non_empty(ENV_ACTOR) {
        return actor;
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        let actor = default_actor();
        assert!(!actor.is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default_name() {
        if std::env::var_os(ENV_DB).is_some() {
            return;
        }
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with("data/docsync.db"));
    }

    #[test]
    fn test_repo_root_priority() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let explicit = PathBuf::from("/flag/repo");
        assert_eq!(
            resolve_repo_root(Some(&explicit), &storage).unwrap(),
            explicit
        );

        if std::env::var_os(ENV_REPO).is_some() {
            return;
        }
        assert_eq!(resolve_repo_root(None, &storage).unwrap(), default_repo_root().unwrap());

        storage.set_setting(SETTING_REPO_PATH, "/stored/repo", "t").unwrap();
        assert_eq!(
            resolve_repo_root(None, &storage).unwrap(),
            PathBuf::from("/stored/repo")
        );
    }

    #[test]
    fn test_sync_config_resolve() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .set_setting(SETTING_REMOTE_URL, "git@example.com:docs.git", "t")
            .unwrap();

        let config = SyncConfig::resolve(Some(Path::new("/tmp/docs")), None, &storage).unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/tmp/docs"));
        if std::env::var_os(ENV_REMOTE).is_none() {
            assert_eq!(config.remote_url.as_deref(), Some("git@example.com:docs.git"));
        }

        let config =
            SyncConfig::resolve(Some(Path::new("/tmp/docs")), Some("/srv/remote.git"), &storage)
                .unwrap();
        assert_eq!(config.remote_url.as_deref(), Some("/srv/remote.git"));
        assert_eq!(config.gateway().root(), Path::new("/tmp/docs"));
    }
}
