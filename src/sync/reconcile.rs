//! Reconciliation of the page store against the Markdown tree on disk.
//!
//! A run makes three ordered passes:
//!
//! 1. **Content**: every `.md` file either refreshes the page recorded at
//!    that path or creates a new root page pinned to that path.
//! 2. **Structure**: every page is re-parented to the page whose file sits
//!    at `<its directory>.md`, or made a root when it lives at the top.
//! 3. **Prune**: pages whose file is gone are deleted with their subtree.
//!
//! Disk paths are authoritative for the duration of a run, so no path is
//! re-derived from titles here. Running twice over an unchanged tree makes
//! no changes the second time.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::model::NewPage;
use crate::storage::SqliteStorage;
use crate::sync::file::{page_file_path, read_page_file, scan_markdown_files};
use crate::sync::slug::{expected_parent_path, title_from_path};
use crate::sync::types::{ReadOutcome, ReconcileStats, SyncError, SyncResult};

/// Lock file name, placed in `.git/` when the root is a git checkout.
pub const LOCK_FILE: &str = "docsync.lock";

/// Holds the per-repository lock for the lifetime of a run.
///
/// The lock file records the holder's PID, and the holder keeps an OS-level
/// exclusive lock on it. The OS drops that lock when the holder exits, so a
/// file left behind by a killed run is reclaimed by the next one.
#[derive(Debug)]
pub struct RunGuard {
    path: PathBuf,
    file: Option<File>,
}

impl RunGuard {
    /// Where the lock for `root` lives.
    #[must_use]
    pub fn lock_path(root: &Path) -> PathBuf {
        let git_dir = root.join(".git");
        if git_dir.is_dir() {
            git_dir.join(LOCK_FILE)
        } else {
            root.join(format!(".{LOCK_FILE}"))
        }
    }

    /// Take the lock, failing with `Busy` if a live run holds it.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when another handle holds the OS lock, or an I/O error.
    pub fn acquire(root: &Path) -> SyncResult<Self> {
        let path = Self::lock_path(root);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(SyncError::Busy(path));
            }
            return Err(e.into());
        }

        let mut previous = String::new();
        file.read_to_string(&mut previous)?;
        let previous = previous.trim();
        if !previous.is_empty() {
            warn!(
                lock = %path.display(),
                pid = previous,
                "Reclaiming stale sync lock from an interrupted run"
            );
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!(lock = %path.display(), "Acquired sync lock");
        Ok(Self {
            path,
            file: Some(file),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        // Unlink while still holding the lock, then close to release it.
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "Failed to remove sync lock");
        }
        drop(self.file.take());
    }
}

/// One reconciliation run over a repository root.
pub struct Reconciler<'a> {
    storage: &'a mut SqliteStorage,
    root: &'a Path,
    actor: &'a str,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(storage: &'a mut SqliteStorage, root: &'a Path, actor: &'a str) -> Self {
        Self {
            storage,
            root,
            actor,
        }
    }

    /// Run all three passes.
    ///
    /// Unreadable files and pages that fail to import are logged and
    /// counted as skipped; they do not abort the run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryMissing` if the root is not a directory, `Busy` if
    /// another run holds the lock, or a database error from the store.
    pub fn run(&mut self) -> SyncResult<ReconcileStats> {
        if !self.root.is_dir() {
            return Err(SyncError::RepositoryMissing(self.root.to_path_buf()));
        }
        let _guard = RunGuard::acquire(self.root)?;

        let files = scan_markdown_files(self.root)?;
        let mut stats = ReconcileStats::default();

        self.import_content(&files, &mut stats)?;
        self.link_parents(&mut stats)?;
        self.prune_missing(&files, &mut stats)?;

        info!(
            root = %self.root.display(),
            files = files.len(),
            created = stats.created,
            updated = stats.updated,
            relinked = stats.relinked,
            pruned = stats.pruned,
            skipped = stats.skipped,
            "Reconciliation complete"
        );
        Ok(stats)
    }

    /// Pass 1: create or refresh a page for every file.
    fn import_content(&mut self, files: &[String], stats: &mut ReconcileStats) -> SyncResult<()> {
        for rel in files {
            let (metadata, body) = match read_page_file(self.root, rel) {
                Ok(ReadOutcome::Found { metadata, body }) => (metadata, body),
                Ok(ReadOutcome::NotFound) => {
                    debug!(path = %rel, "File vanished during scan");
                    continue;
                }
                Err(e) => {
                    warn!(path = %rel, error = %e, "Skipping unreadable file");
                    stats.skipped += 1;
                    continue;
                }
            };

            match self.storage.get_page_by_path(rel)? {
                Some(page) => {
                    if body.trim() == page.content_md.trim() {
                        continue;
                    }
                    match self.storage.update_content(page.id, &body, self.actor) {
                        Ok(_) => {
                            debug!(page_id = page.id, path = %rel, "Content refreshed from disk");
                            stats.updated += 1;
                        }
                        Err(e) => {
                            warn!(page_id = page.id, path = %rel, error = %e, "Failed to update page");
                            stats.skipped += 1;
                        }
                    }
                }
                None => {
                    let title = metadata
                        .get("title")
                        .filter(|t| !t.is_empty())
                        .cloned()
                        .unwrap_or_else(|| title_from_path(rel));
                    let new = NewPage::new(title, body).at_path(rel.clone());
                    match self.storage.create_page(&new, self.actor) {
                        Ok(page) => {
                            debug!(page_id = page.id, path = %rel, title = %page.title, "Imported page");
                            stats.created += 1;
                        }
                        Err(e) => {
                            warn!(path = %rel, error = %e, "Failed to import file");
                            stats.skipped += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Pass 2: make parent links match the directory layout.
    fn link_parents(&mut self, stats: &mut ReconcileStats) -> SyncResult<()> {
        let pages = self.storage.list_pages()?;

        let mut path_to_id: HashMap<&str, i64> = HashMap::new();
        for page in pages.iter().filter(|p| !p.file_path.is_empty()) {
            path_to_id.entry(page.file_path.as_str()).or_insert(page.id);
        }

        let mut moves = Vec::new();
        for page in pages.iter().filter(|p| !p.file_path.is_empty()) {
            let wanted = match expected_parent_path(&page.file_path) {
                None => None,
                Some(parent_path) => match path_to_id.get(parent_path.as_str()) {
                    Some(&id) if id != page.id => Some(id),
                    // No page for the directory: leave the current parent.
                    _ => continue,
                },
            };
            if page.parent_id != wanted {
                moves.push((page.id, wanted));
            }
        }

        for (id, parent) in moves {
            self.storage.set_parent_raw(id, parent, self.actor)?;
            debug!(page_id = id, parent_id = ?parent, "Relinked page to match disk layout");
            stats.relinked += 1;
        }
        Ok(())
    }

    /// Pass 3: delete pages whose file no longer exists.
    fn prune_missing(&mut self, files: &[String], stats: &mut ReconcileStats) -> SyncResult<()> {
        let seen: HashSet<&str> = files.iter().map(String::as_str).collect();
        let mut removed = HashSet::new();

        for page in self.storage.list_pages()? {
            if page.file_path.is_empty()
                || seen.contains(page.file_path.as_str())
                || removed.contains(&page.id)
            {
                continue;
            }
            match page_file_path(self.root, &page.file_path) {
                Ok(full) if full.exists() => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(page_id = page.id, error = %e, "Page path cannot be checked, keeping page");
                    continue;
                }
            }

            let deleted = self.storage.delete_page(page.id, self.actor)?;
            info!(
                page_id = page.id,
                path = %page.file_path,
                removed = deleted.len(),
                "Pruned page whose file is gone"
            );
            stats.pruned += deleted.len();
            removed.extend(deleted.into_iter().map(|p| p.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ACTOR: &str = "sync";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run(storage: &mut SqliteStorage, root: &Path) -> ReconcileStats {
        Reconciler::new(storage, root, ACTOR).run().unwrap()
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let missing = temp.path().join("nope");

        let err = Reconciler::new(&mut storage, &missing, ACTOR).run().unwrap_err();
        assert!(matches!(err, SyncError::RepositoryMissing(_)));
    }

    #[test]
    fn test_import_links_parents_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut storage = SqliteStorage::open_memory().unwrap();

        write(root, "guides.md", "---\ntitle: Guides\n---\n\nAll guides.");
        write(root, "guides/setup.md", "Install things.");
        write(root, ".git/ignored.md", "not a page");

        let stats = run(&mut storage, root);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.relinked, 1);
        assert_eq!(stats.pruned, 0);

        let guides = storage.get_page_by_path("guides.md").unwrap().unwrap();
        let setup = storage.get_page_by_path("guides/setup.md").unwrap().unwrap();
        assert_eq!(guides.title, "Guides");
        assert_eq!(guides.content_md, "All guides.");
        assert_eq!(setup.title, "setup");
        assert_eq!(setup.parent_id, Some(guides.id));

        let again = run(&mut storage, root);
        assert!(again.is_empty(), "second run changed {again:?}");
    }

    #[test]
    fn test_content_update_from_disk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut storage = SqliteStorage::open_memory().unwrap();

        write(root, "notes.md", "---\ntitle: Notes\n---\n\nfirst");
        run(&mut storage, root);

        write(root, "notes.md", "---\ntitle: Notes\n---\n\nsecond");
        let stats = run(&mut storage, root);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.created, 0);

        let page = storage.get_page_by_path("notes.md").unwrap().unwrap();
        assert_eq!(page.content_md, "second");
        assert_eq!(page.last_editor.as_deref(), Some(ACTOR));
    }

    #[test]
    fn test_prune_cascades_to_children() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut storage = SqliteStorage::open_memory().unwrap();

        write(root, "a.md", "a");
        write(root, "a/b.md", "b");
        write(root, "a/b/c.md", "c");
        write(root, "keep.md", "k");
        run(&mut storage, root);
        assert_eq!(storage.page_count().unwrap(), 4);

        fs::remove_file(root.join("a.md")).unwrap();
        fs::remove_dir_all(root.join("a")).unwrap();

        let stats = run(&mut storage, root);
        assert_eq!(stats.pruned, 3);
        assert_eq!(storage.page_count().unwrap(), 1);
        assert!(storage.get_page_by_path("keep.md").unwrap().is_some());
    }

    #[test]
    fn test_moving_file_to_root_clears_parent() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut storage = SqliteStorage::open_memory().unwrap();

        write(root, "a.md", "a");
        write(root, "a/b.md", "b");
        run(&mut storage, root);

        fs::rename(root.join("a/b.md"), root.join("b.md")).unwrap();
        let stats = run(&mut storage, root);
        // b.md is a new page; a/b.md's record is pruned.
        assert_eq!(stats.created, 1);
        assert_eq!(stats.pruned, 1);

        let b = storage.get_page_by_path("b.md").unwrap().unwrap();
        assert!(b.parent_id.is_none());
    }

    #[test]
    fn test_concurrent_run_is_busy() {
        let temp = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let _held = RunGuard::acquire(temp.path()).unwrap();
        let err = Reconciler::new(&mut storage, temp.path(), ACTOR)
            .run()
            .unwrap_err();
        assert!(matches!(err, SyncError::Busy(_)));
    }

    #[test]
    fn test_stale_lock_file_is_reclaimed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut storage = SqliteStorage::open_memory().unwrap();
        write(root, "home.md", "Welcome.");

        // A killed run leaves its lock file behind without an OS lock.
        let lock = RunGuard::lock_path(root);
        fs::write(&lock, "4194304\n").unwrap();

        let stats = run(&mut storage, root);
        assert_eq!(stats.created, 1);
        assert!(!lock.exists());

        fs::write(&lock, "").unwrap();
        assert!(run(&mut storage, root).is_empty());
        assert!(!lock.exists());
    }

    #[test]
    fn test_held_lock_records_pid() {
        let temp = TempDir::new().unwrap();
        let guard = RunGuard::acquire(temp.path()).unwrap();
        let recorded = fs::read_to_string(RunGuard::lock_path(temp.path())).unwrap();
        assert_eq!(recorded.trim(), std::process::id().to_string());

        assert!(matches!(
            RunGuard::acquire(temp.path()),
            Err(SyncError::Busy(_))
        ));
        drop(guard);
        assert!(RunGuard::acquire(temp.path()).is_ok());
    }

    #[test]
    fn test_lock_released_after_run() {
        let temp = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        run(&mut storage, temp.path());
        assert!(!RunGuard::lock_path(temp.path()).exists());

        fs::create_dir(temp.path().join(".git")).unwrap();
        assert!(RunGuard::lock_path(temp.path()).ends_with(".git/docsync.lock"));
    }
}
