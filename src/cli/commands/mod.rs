//! Command implementations.

pub mod completions;
pub mod convert;
pub mod git;
pub mod init;
pub mod page;
pub mod sync;
pub mod version;
pub mod watch;

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::{default_actor, resolve_db_path, SyncConfig};
use crate::error::{Error, Result};
use crate::model::Page;
use crate::storage::SqliteStorage;
use crate::sync::SyncEngine;

/// Global flags every page or sync command needs.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub db_path: Option<&'a PathBuf>,
    pub repo: Option<&'a PathBuf>,
    pub actor: Option<&'a str>,
    pub json: bool,
}

impl Context<'_> {
    /// Effective actor name.
    #[must_use]
    pub fn actor(&self) -> String {
        self.actor.map_or_else(default_actor, ToString::to_string)
    }
}

/// Open an existing database.
///
/// # Errors
///
/// Returns `NotInitialized` if the database file does not exist.
pub fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open(&db_path)
}

/// Open the database and wrap it in an engine for the resolved repository.
///
/// # Errors
///
/// Returns `NotInitialized` or a configuration error.
pub fn open_engine(ctx: &Context<'_>) -> Result<SyncEngine> {
    let storage = open_storage(ctx.db_path)?;
    let config = SyncConfig::resolve(ctx.repo.map(PathBuf::as_path), None, &storage)?;
    Ok(SyncEngine::new(storage, config, ctx.actor()))
}

/// Look up a page by id, exact title, or relative file path.
///
/// # Errors
///
/// Returns `PageNotFoundSimilar` with close titles when nothing matches.
pub fn resolve_page(storage: &SqliteStorage, reference: &str) -> Result<Page> {
    let reference = reference.trim();

    if let Ok(id) = reference.parse::<i64>() {
        if let Some(page) = storage.get_page(id)? {
            return Ok(page);
        }
    }
    if let Some(page) = storage.get_page_by_title(reference)? {
        return Ok(page);
    }
    if let Some(page) = storage.get_page_by_path(reference.trim_start_matches("./"))? {
        return Ok(page);
    }

    let similar = storage.find_similar_titles(reference, 3)?;
    if similar.is_empty() {
        Err(Error::PageNotFound {
            id: reference.to_string(),
        })
    } else {
        Err(Error::PageNotFoundSimilar {
            id: reference.to_string(),
            similar,
        })
    }
}

/// Content from `--content`, `--file`, or stdin, in that order.
///
/// # Errors
///
/// Returns an IO error if the file or stdin cannot be read.
pub fn read_content(content: Option<&str>, file: Option<&Path>) -> Result<String> {
    if let Some(content) = content {
        return Ok(content.to_string());
    }
    if let Some(path) = file {
        return Ok(std::fs::read_to_string(path)?);
    }
    read_stdin()
}

/// Read all of stdin.
///
/// # Errors
///
/// Returns an IO error if stdin cannot be read.
pub fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewPage;
    use tempfile::TempDir;

    #[test]
    fn test_open_storage_requires_existing_db() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.db");
        let err = open_storage(Some(&missing)).unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn test_resolve_page_by_id_title_and_path() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let guide = storage.create_page(&NewPage::new("Guide", ""), "t").unwrap();
        let setup = storage
            .create_page(&NewPage::new("Setup", "").with_parent(guide.id), "t")
            .unwrap();

        assert_eq!(resolve_page(&storage, &guide.id.to_string()).unwrap().id, guide.id);
        assert_eq!(resolve_page(&storage, "Setup").unwrap().id, setup.id);
        assert_eq!(resolve_page(&storage, &setup.file_path).unwrap().id, setup.id);
    }

    #[test]
    fn test_resolve_page_suggests_similar_titles() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.create_page(&NewPage::new("Installation", ""), "t").unwrap();

        match resolve_page(&storage, "Install") {
            Err(Error::PageNotFoundSimilar { similar, .. }) => {
                assert_eq!(similar, vec!["Installation".to_string()]);
            }
            other => panic!("expected suggestions, got {other:?}"),
        }
        assert!(matches!(
            resolve_page(&storage, "zzz"),
            Err(Error::PageNotFound { .. })
        ));
    }

    #[test]
    fn test_read_content_prefers_inline() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("body.md");
        std::fs::write(&file, "from file").unwrap();

        assert_eq!(read_content(Some("inline"), Some(&file)).unwrap(), "inline");
        assert_eq!(read_content(None, Some(&file)).unwrap(), "from file");
    }
}
