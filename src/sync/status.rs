//! Sync status display.
//!
//! Compares the page store with the Markdown tree under the repository
//! root: pages whose file is missing, files with no page, and pages whose
//! file body no longer matches the stored content.

use std::collections::HashSet;
use std::path::Path;

use colored::Colorize;
use tracing::warn;

use crate::storage::sqlite::SqliteStorage;
use crate::sync::file::{read_page_file, scan_markdown_files};
use crate::sync::hash::{content_hash, has_changed};
use crate::sync::types::{ReadOutcome, SyncResult, SyncStatus};

/// Get the current sync status for a repository root.
///
/// # Errors
///
/// Returns `RepositoryMissing` if the root is not a directory, or an error
/// if database queries fail.
pub fn get_sync_status(storage: &SqliteStorage, root: &Path) -> SyncResult<SyncStatus> {
    let files = scan_markdown_files(root)?;
    let pages = storage.list_pages()?;

    let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();
    let tracked: HashSet<&str> = pages.iter().map(|p| p.file_path.as_str()).collect();

    let mut status = SyncStatus {
        repo_root: root.display().to_string(),
        total_pages: pages.len(),
        total_files: files.len(),
        ..SyncStatus::default()
    };

    for page in &pages {
        if page.file_path.is_empty() {
            continue;
        }
        if !on_disk.contains(page.file_path.as_str()) {
            status.missing_files.push(page.file_path.clone());
            continue;
        }
        let body = match read_page_file(root, &page.file_path) {
            Ok(ReadOutcome::Found { body, .. }) => body,
            Ok(ReadOutcome::NotFound) => continue,
            Err(e) => {
                warn!(path = %page.file_path, error = %e, "Skipping unreadable file");
                continue;
            }
        };
        let stored = content_hash(&page.content_md);
        if has_changed(&content_hash(&body), Some(&stored)) {
            status.modified.push(page.file_path.clone());
        }
    }

    status.untracked_files = files
        .iter()
        .filter(|f| !tracked.contains(f.as_str()))
        .cloned()
        .collect();
    status.missing_files.sort();
    status.modified.sort();

    Ok(status)
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();
    println!("  Repository: {}", status.repo_root);
    println!("  Pages:      {}", status.total_pages);
    println!("  Files:      {}", status.total_files);
    println!();

    if status.is_clean() {
        println!("{}", "Store and repository are in sync.".green());
        return;
    }

    print_section("Missing on disk:", &status.missing_files);
    print_section("Untracked files:", &status.untracked_files);
    print_section("Modified on disk:", &status.modified);

    if !status.missing_files.is_empty() {
        println!(
            "{}",
            "Run 'docsync sync write-all' to write missing files.".dimmed()
        );
    }
    if !status.untracked_files.is_empty() || !status.modified.is_empty() {
        println!(
            "{}",
            "Run 'docsync sync reconcile' to import changes from disk.".dimmed()
        );
    }
}

fn print_section(label: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    println!("{}", label.yellow().bold());
    for path in paths {
        println!("  {path}");
    }
    println!();
}
