//! Markdown mirror of the page tree.
//!
//! This module keeps a directory of Markdown files in step with the page
//! store:
//!
//! - **Slugs**: titles → file paths (`slug`)
//! - **Frontmatter**: metadata header codec (`frontmatter`)
//! - **Conversion**: Markdown ⇄ HTML and link rewriting (`convert`)
//! - **Files**: atomic writes, reads, deletes and scans (`file`)
//! - **Reconciliation**: disk → store merge in three passes (`reconcile`)
//! - **Engine**: store mutations with their file side effects (`engine`)
//! - **Status**: store vs disk comparison with SHA256 hashes (`status`)
//!
//! # File Format
//!
//! ```text
//! ---
//! title: Setup
//! author: alice
//! created_at: 2025-01-20T10:00:00+00:00
//! last_edited_at: 2025-01-21T09:30:00+00:00
//! ---
//!
//! # Setup
//! See [Login](doc://42).
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docsync::sync::SyncEngine;
//!
//! let mut engine = SyncEngine::new(storage, config, "alice");
//! let page = engine.create_page(&NewPage::new("Setup", "# Setup"))?;
//! let stats = engine.reconcile()?;
//! ```

pub mod convert;
pub mod engine;
pub mod file;
pub mod frontmatter;
mod hash;
pub mod reconcile;
pub mod slug;
mod status;
mod types;

// Re-export main types and functions
pub use convert::{html_to_markdown, markdown_to_html, Conversion, PathResolver};
pub use engine::{AutoSyncReport, SyncEngine, AUTO_SYNC_MESSAGE};
pub use file::{
    atomic_write, delete_page_file, ensure_gitignore, gitignore_content, read_page_file,
    scan_markdown_files, write_page_file,
};
pub use frontmatter::{Frontmatter, ParsedDocument};
pub use hash::{content_hash, has_changed};
pub use reconcile::{Reconciler, RunGuard};
pub use status::{get_sync_status, print_status};
pub use types::{ReadOutcome, ReconcileStats, SyncError, SyncResult, SyncStatus, WriteStats};
