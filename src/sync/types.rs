//! Sync types shared by the file mirror and reconciliation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Outcome of reading a single page file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The file exists; frontmatter has been split from the body.
    Found {
        metadata: BTreeMap<String, String>,
        body: String,
    },
    /// No file at the requested path.
    NotFound,
}

/// Counts reported by a reconciliation run.
///
/// For observability only; callers do not branch on specific values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Pages created from files with no matching record.
    pub created: usize,
    /// Pages whose content was refreshed from disk.
    pub updated: usize,
    /// Pages whose parent was changed to match the directory layout.
    pub relinked: usize,
    /// Records removed because their file disappeared (descendants included).
    pub pruned: usize,
    /// Files skipped because they could not be read or imported.
    pub skipped: usize,
}

impl ReconcileStats {
    /// Total number of store mutations.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.relinked + self.pruned
    }

    /// Returns true if the run changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

/// Counts reported by a bulk write of the store to disk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub written: usize,
    pub failed: usize,
}

/// Comparison of the page store against the file tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Repository root that was inspected.
    pub repo_root: String,
    /// Number of page records.
    pub total_pages: usize,
    /// Number of Markdown files on disk.
    pub total_files: usize,
    /// Pages whose file does not exist.
    pub missing_files: Vec<String>,
    /// Files with no page record.
    pub untracked_files: Vec<String>,
    /// Pages whose file body differs from the stored content.
    pub modified: Vec<String>,
}

impl SyncStatus {
    /// True when store and disk agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_files.is_empty() && self.untracked_files.is_empty() && self.modified.is_empty()
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("Scan error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Repository root is unset or not a directory.
    #[error("Repository root does not exist: {}", .0.display())]
    RepositoryMissing(PathBuf),

    /// Another reconciliation holds the lock for this repository.
    #[error("Another sync is already running (lock file {})", .0.display())]
    Busy(PathBuf),

    /// A page path escapes the repository root.
    #[error("Invalid page path: {0}")]
    InvalidPath(String),

    /// Page record missing.
    #[error("Page not found: {0}")]
    PageNotFound(i64),
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
