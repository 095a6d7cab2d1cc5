//! Sync engine: page operations that keep the Markdown mirror current.
//!
//! Every store mutation made through the engine is followed by the file
//! work it implies. A failed file write is logged and skipped; the store
//! stays the source of truth and the next `write-all` or reconciliation
//! repairs the mirror.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::git::{Author, RepositoryGateway};
use crate::model::{NewPage, Page, PathChange};
use crate::storage::SqliteStorage;
use crate::sync::file::{self, ensure_gitignore};
use crate::sync::reconcile::Reconciler;
use crate::sync::status::get_sync_status;
use crate::sync::types::{ReadOutcome, ReconcileStats, SyncStatus, WriteStats};

/// Commit message used by unattended syncs.
pub const AUTO_SYNC_MESSAGE: &str = "Auto-sync from docsync";

/// Result of one `auto_sync` round.
#[derive(Debug, Clone, Serialize)]
pub struct AutoSyncReport {
    /// Commit and push summary, when that step succeeded.
    pub push: Option<String>,
    /// Commit or push failure, reported but not fatal.
    pub push_error: Option<String>,
    /// Pull summary.
    pub pull: String,
    /// Changes made by the reconciliation after the pull.
    pub reconcile: ReconcileStats,
}

/// Page store plus the repository it mirrors into.
pub struct SyncEngine {
    storage: SqliteStorage,
    config: SyncConfig,
    actor: String,
}

impl SyncEngine {
    #[must_use]
    pub fn new(storage: SqliteStorage, config: SyncConfig, actor: impl Into<String>) -> Self {
        Self {
            storage,
            config,
            actor: actor.into(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut SqliteStorage {
        &mut self.storage
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    fn require_page(&self, id: i64) -> Result<Page> {
        self.storage
            .get_page(id)?
            .ok_or_else(|| Error::PageNotFound { id: id.to_string() })
    }

    // ==================
    // Page operations with file mirroring
    // ==================

    /// Create a page and write its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the page.
    pub fn create_page(&mut self, new: &NewPage) -> Result<Page> {
        let page = self.storage.create_page(new, &self.actor)?;
        self.write_best_effort(&page);
        Ok(page)
    }

    /// Replace a page's Markdown and rewrite its file when it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn edit_markdown(&mut self, id: i64, markdown: &str) -> Result<bool> {
        let changed = self.storage.update_content(id, markdown, &self.actor)?;
        if changed {
            let page = self.require_page(id)?;
            self.write_best_effort(&page);
        }
        Ok(changed)
    }

    /// Replace a page's content from HTML and rewrite its file when it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn edit_html(&mut self, id: i64, html: &str) -> Result<bool> {
        let changed = self.storage.update_html(id, html, &self.actor)?;
        if changed {
            let page = self.require_page(id)?;
            self.write_best_effort(&page);
        }
        Ok(changed)
    }

    /// Rename a page, moving its file and every descendant's file.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn rename_page(&mut self, id: i64, title: &str) -> Result<Vec<PathChange>> {
        let changes = self.storage.rename_page(id, title, &self.actor)?;
        self.apply_path_changes(&changes)?;
        if changes.is_empty() {
            // Title may still differ (frontmatter), rewrite in place.
            let page = self.require_page(id)?;
            self.write_best_effort(&page);
        }
        Ok(changes)
    }

    /// Move a page under a new parent, moving the files of its subtree.
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` for moves into the page's own subtree, or a
    /// store error.
    pub fn move_page(&mut self, id: i64, parent: Option<i64>) -> Result<Vec<PathChange>> {
        let changes = self.storage.move_page(id, parent, &self.actor)?;
        self.apply_path_changes(&changes)?;
        Ok(changes)
    }

    /// Delete a page, its descendants, and their files.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn delete_page(&mut self, id: i64) -> Result<Vec<Page>> {
        let removed = self.storage.delete_page(id, &self.actor)?;
        for page in removed.iter().rev() {
            self.remove_file_best_effort(&page.file_path);
        }
        Ok(removed)
    }

    fn apply_path_changes(&mut self, changes: &[PathChange]) -> Result<()> {
        // All old files go first so a new path can reuse a freed one.
        for change in changes {
            self.remove_file_best_effort(&change.old_path);
        }
        for change in changes {
            let page = self.require_page(change.id)?;
            self.write_best_effort(&page);
        }
        Ok(())
    }

    fn write_best_effort(&self, page: &Page) {
        if let Err(e) = self.write_page_record(page) {
            warn!(page_id = page.id, path = %page.file_path, error = %e, "Failed to write page file");
        }
    }

    fn remove_file_best_effort(&self, rel_path: &str) {
        if rel_path.is_empty() {
            return;
        }
        if let Err(e) = file::delete_page_file(&self.config.repo_root, rel_path) {
            warn!(path = %rel_path, error = %e, "Failed to delete page file");
        }
    }

    fn write_page_record(&self, page: &Page) -> Result<PathBuf> {
        Ok(file::write_page_file(
            &self.config.repo_root,
            &page.file_path,
            &page.frontmatter(),
            &page.content_md,
        )?)
    }

    // ==================
    // Per-page file operations
    // ==================

    /// Write a page's file from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the write fails.
    pub fn write_page(&self, id: i64) -> Result<PathBuf> {
        let page = self.require_page(id)?;
        self.write_page_record(&page)
    }

    /// Read a page's file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the file is unreadable.
    pub fn read_page(&self, id: i64) -> Result<ReadOutcome> {
        let page = self.require_page(id)?;
        Ok(file::read_page_file(&self.config.repo_root, &page.file_path)?)
    }

    /// Delete a page's file, keeping the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or removal fails.
    pub fn delete_page_file(&self, id: i64) -> Result<bool> {
        let page = self.require_page(id)?;
        Ok(file::delete_page_file(&self.config.repo_root, &page.file_path)?)
    }

    /// Load a page's file content into the store.
    ///
    /// Returns `false` when the file is missing or already matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the page does not exist or the store fails.
    pub fn import_page(&mut self, id: i64) -> Result<bool> {
        match self.read_page(id)? {
            ReadOutcome::Found { body, .. } => {
                let page = self.require_page(id)?;
                if body.trim() == page.content_md.trim() {
                    return Ok(false);
                }
                self.storage.update_content(id, &body, &self.actor)
            }
            ReadOutcome::NotFound => Ok(false),
        }
    }

    // ==================
    // Whole-repository operations
    // ==================

    /// Write every page's file.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or pages cannot be listed.
    pub fn write_all(&self) -> Result<WriteStats> {
        fs::create_dir_all(&self.config.repo_root)?;
        ensure_gitignore(&self.config.repo_root)?;

        let mut stats = WriteStats::default();
        for page in self.storage.list_pages()? {
            match self.write_page_record(&page) {
                Ok(_) => stats.written += 1,
                Err(e) => {
                    warn!(page_id = page.id, path = %page.file_path, error = %e, "Failed to write page file");
                    stats.failed += 1;
                }
            }
        }

        info!(written = stats.written, failed = stats.failed, "Wrote page files");
        Ok(stats)
    }

    /// Merge the disk tree back into the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing, busy, or the store fails.
    pub fn reconcile(&mut self) -> Result<ReconcileStats> {
        let stats = Reconciler::new(&mut self.storage, &self.config.repo_root, &self.actor).run()?;
        Ok(stats)
    }

    /// Compare store and disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing or the store fails.
    pub fn status(&self) -> Result<SyncStatus> {
        Ok(get_sync_status(&self.storage, &self.config.repo_root)?)
    }

    // ==================
    // Repository gateway
    // ==================

    /// Stage and commit everything under the root.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub fn commit(&self, gateway: &dyn RepositoryGateway, message: &str) -> Result<String> {
        Ok(gateway.stage_and_commit(message, &Author::from_actor(&self.actor))?)
    }

    /// Commit, then push.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error.
    pub fn commit_and_push(&self, gateway: &dyn RepositoryGateway, message: &str) -> Result<String> {
        let committed = self.commit(gateway, message)?;
        let pushed = gateway.push()?;
        Ok(format!("{committed} {pushed}"))
    }

    /// Pull with rebase, then reconcile the store with the updated tree.
    ///
    /// # Errors
    ///
    /// Returns the gateway error, or a reconciliation error.
    pub fn pull_and_reconcile(
        &mut self,
        gateway: &dyn RepositoryGateway,
    ) -> Result<(String, ReconcileStats)> {
        let pulled = gateway.pull()?;
        let stats = self.reconcile()?;
        Ok((pulled, stats))
    }

    /// Push local changes, then pull and reconcile.
    ///
    /// A failed commit or push (for example a rejected non-fast-forward)
    /// is logged and reported; the pull still runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull or the reconciliation fails.
    pub fn auto_sync(&mut self, gateway: &dyn RepositoryGateway) -> Result<AutoSyncReport> {
        let (push, push_error) = match self.commit_and_push(gateway, AUTO_SYNC_MESSAGE) {
            Ok(summary) => {
                info!(%summary, "Auto-sync push");
                (Some(summary), None)
            }
            Err(e) => {
                warn!(error = %e, "Auto-sync push skipped or failed");
                (None, Some(e.to_string()))
            }
        };

        let (pull, reconcile) = self.pull_and_reconcile(gateway)?;
        info!(%pull, changes = reconcile.total_changes(), "Auto-sync pull");

        Ok(AutoSyncReport {
            push,
            push_error,
            pull,
            reconcile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{GatewayError, GatewayResult};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    fn engine(root: &Path) -> SyncEngine {
        SyncEngine::new(
            SqliteStorage::open_memory().unwrap(),
            SyncConfig::new(root),
            "tester",
        )
    }

    #[derive(Default)]
    struct FakeGateway {
        calls: RefCell<Vec<&'static str>>,
        reject_push: bool,
    }

    impl RepositoryGateway for FakeGateway {
        fn stage_and_commit(&self, _message: &str, author: &Author) -> GatewayResult<String> {
            assert_eq!(author.name, "tester");
            self.calls.borrow_mut().push("commit");
            Ok("Committed abc123".to_string())
        }

        fn push(&self) -> GatewayResult<String> {
            self.calls.borrow_mut().push("push");
            if self.reject_push {
                Err(GatewayError::Failed("rejected (non-fast-forward)".to_string()))
            } else {
                Ok("Pushed".to_string())
            }
        }

        fn pull(&self) -> GatewayResult<String> {
            self.calls.borrow_mut().push("pull");
            Ok("Pulled main".to_string())
        }
    }

    #[test]
    fn test_create_writes_file_with_frontmatter() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path());

        let page = engine
            .create_page(&NewPage::new("Getting Started", "Hello"))
            .unwrap();

        let raw = fs::read_to_string(temp.path().join("getting-started.md")).unwrap();
        assert!(raw.starts_with("---\ntitle: Getting Started\nauthor: tester\n"));
        assert!(raw.ends_with("\nHello"));
        assert!(matches!(
            engine.read_page(page.id).unwrap(),
            ReadOutcome::Found { body, .. } if body == "Hello"
        ));
    }

    #[test]
    fn test_rename_moves_subtree_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut engine = engine(root);

        let guides = engine.create_page(&NewPage::new("Guides", "g")).unwrap();
        engine
            .create_page(&NewPage::new("Setup", "s").with_parent(guides.id))
            .unwrap();
        assert!(root.join("guides/setup.md").exists());

        let changes = engine.rename_page(guides.id, "Manuals").unwrap();
        assert_eq!(changes.len(), 2);
        assert!(root.join("manuals.md").exists());
        assert!(root.join("manuals/setup.md").exists());
        assert!(!root.join("guides.md").exists());
        assert!(!root.join("guides").exists());
    }

    #[test]
    fn test_delete_removes_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut engine = engine(root);

        let a = engine.create_page(&NewPage::new("A", "a")).unwrap();
        engine.create_page(&NewPage::new("B", "b").with_parent(a.id)).unwrap();

        let removed = engine.delete_page(a.id).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!root.join("a.md").exists());
        assert!(!root.join("a").exists());
    }

    #[test]
    fn test_write_all_then_reconcile_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path());

        let parent = engine.create_page(&NewPage::new("Parent", "p\n")).unwrap();
        engine
            .create_page(&NewPage::new("Child", "c").with_parent(parent.id))
            .unwrap();

        let stats = engine.write_all().unwrap();
        assert_eq!(stats.written, 2);
        assert!(temp.path().join(".gitignore").exists());

        let first = engine.reconcile().unwrap();
        assert_eq!(first.created, 0);
        assert_eq!(first.pruned, 0);
        assert_eq!(first.relinked, 0);
        assert!(engine.reconcile().unwrap().is_empty());
        assert!(engine.status().unwrap().is_clean());
    }

    #[test]
    fn test_import_page_reads_disk_edit() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path());
        let page = engine.create_page(&NewPage::new("Notes", "old")).unwrap();

        fs::write(temp.path().join("notes.md"), "---\ntitle: Notes\n---\n\nnew").unwrap();
        assert!(engine.import_page(page.id).unwrap());
        assert!(!engine.import_page(page.id).unwrap());
        assert_eq!(engine.require_page(page.id).unwrap().content_md, "new");

        assert!(engine.delete_page_file(page.id).unwrap());
        assert!(!engine.import_page(page.id).unwrap());
    }

    #[test]
    fn test_auto_sync_pulls_even_when_push_fails() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path());
        let gateway = FakeGateway {
            reject_push: true,
            ..FakeGateway::default()
        };

        let report = engine.auto_sync(&gateway).unwrap();
        assert!(report.push.is_none());
        assert!(report.push_error.unwrap().contains("rejected"));
        assert_eq!(report.pull, "Pulled main");
        assert_eq!(*gateway.calls.borrow(), vec!["commit", "push", "pull"]);
    }

    #[test]
    fn test_pull_and_reconcile_imports_new_files() {
        let temp = TempDir::new().unwrap();
        let mut engine = engine(temp.path());
        fs::write(temp.path().join("remote.md"), "from upstream").unwrap();

        let (summary, stats) = engine.pull_and_reconcile(&FakeGateway::default()).unwrap();
        assert_eq!(summary, "Pulled main");
        assert_eq!(stats.created, 1);
    }
}
