//! Initialize docsync.
//!
//! # Architecture
//!
//! docsync keeps one **global database** (default
//! `~/.docsync/data/docsync.db`) and mirrors its pages into one repository
//! directory. `docsync init` creates the database, creates the repository
//! directory if needed, and records the repository path (and optional
//! remote URL) in the database's settings so later commands need no flags.
//!
//! `--force` on an existing database re-records the settings; pages are
//! kept.

use crate::config::{resolve_db_path, resolve_repo_root, SETTING_REMOTE_URL, SETTING_REPO_PATH};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use crate::sync::ensure_gitignore;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    repository: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<String>,
    pages: usize,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directories or database cannot be created.
pub fn execute(
    db_path: Option<&PathBuf>,
    repo: Option<&PathBuf>,
    remote: Option<&str>,
    actor: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or_else(|| {
        Error::Config("Could not determine the database location; pass --db".to_string())
    })?;

    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    // Schema is applied on open.
    let mut storage = SqliteStorage::open(&db_path)?;

    let repo_root = absolute(&resolve_repo_root(repo.map(PathBuf::as_path), &storage)?)?;
    fs::create_dir_all(&repo_root)?;
    ensure_gitignore(&repo_root)?;

    storage.set_setting(SETTING_REPO_PATH, &repo_root.to_string_lossy(), actor)?;
    let remote_url = remote.map(str::trim).filter(|u| !u.is_empty());
    if let Some(url) = remote_url {
        storage.set_setting(SETTING_REMOTE_URL, url, actor)?;
    }

    let pages = storage.page_count()?;
    let remote_url = storage.get_setting(SETTING_REMOTE_URL)?;

    if json {
        let output = InitOutput {
            database: db_path,
            repository: repo_root,
            remote_url,
            pages,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized docsync");
        println!("  Database:   {}", db_path.display());
        println!("  Repository: {}", repo_root.display());
        if let Some(url) = remote_url {
            println!("  Remote:     {url}");
        }
        if pages > 0 {
            println!("  Pages:      {pages} (kept)");
        }
        println!();
        println!("Next: 'docsync page create <title>' or 'docsync sync reconcile' to import existing files.");
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
