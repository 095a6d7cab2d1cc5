//! Page file I/O inside the repository root.
//!
//! This module provides:
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Permission normalisation so editors running as another user can
//!   read and write the same tree
//! - Frontmatter-aware reads that report a missing file as not found
//! - The Markdown file scan used by reconciliation

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::sync::frontmatter::{self, Frontmatter};
use crate::sync::slug::MARKDOWN_EXT;
use crate::sync::types::{ReadOutcome, SyncError, SyncResult};

/// Mode applied to directories created for page files.
pub const DIR_MODE: u32 = 0o777;
/// Mode applied to written page files.
pub const FILE_MODE: u32 = 0o666;

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let temp_path = path.with_extension("md.tmp");

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Resolve a page's relative path inside the repository root.
///
/// # Errors
///
/// Returns `InvalidPath` for empty or absolute paths and for paths that
/// climb out of the root with `..`.
pub fn page_file_path(root: &Path, rel_path: &str) -> SyncResult<PathBuf> {
    let rel = Path::new(rel_path);
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rel_path.is_empty() || escapes {
        return Err(SyncError::InvalidPath(rel_path.to_string()));
    }
    Ok(root.join(rel))
}

/// Create a directory tree and relax the mode of every directory created.
fn ensure_dir(dir: &Path) -> SyncResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    // Remember which ancestors are new so only those get their mode changed.
    let mut missing = Vec::new();
    let mut cursor = Some(dir);
    while let Some(d) = cursor {
        if d.exists() {
            break;
        }
        missing.push(d.to_path_buf());
        cursor = d.parent();
    }

    fs::create_dir_all(dir)?;
    for created in missing {
        set_mode(&created, DIR_MODE);
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        debug!(path = %path.display(), error = %e, "Could not relax permissions");
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

/// Write a page file: frontmatter header, blank line, Markdown body.
///
/// Creates the repository root and the file's parent directories when
/// missing, then relaxes the file's mode.
///
/// # Errors
///
/// Returns an error if directories cannot be created or the file cannot be
/// written. Callers log it and move on to the next page.
pub fn write_page_file(
    root: &Path,
    rel_path: &str,
    frontmatter: &Frontmatter,
    body: &str,
) -> SyncResult<PathBuf> {
    let full_path = page_file_path(root, rel_path)?;

    ensure_dir(root)?;
    if let Some(parent) = full_path.parent() {
        ensure_dir(parent)?;
    }

    atomic_write(&full_path, &frontmatter::serialize(frontmatter, body))?;
    set_mode(&full_path, FILE_MODE);

    debug!(path = rel_path, "Wrote page file");
    Ok(full_path)
}

/// Read a page file and split off its frontmatter.
///
/// # Errors
///
/// Returns an error for I/O failures other than the file not existing.
pub fn read_page_file(root: &Path, rel_path: &str) -> SyncResult<ReadOutcome> {
    let full_path = page_file_path(root, rel_path)?;

    match fs::read_to_string(&full_path) {
        Ok(raw) => {
            let doc = frontmatter::parse(&raw);
            Ok(ReadOutcome::Found {
                metadata: doc.metadata,
                body: doc.body,
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(ReadOutcome::NotFound),
        Err(e) => Err(e.into()),
    }
}

/// Delete a page file.
///
/// Directories left empty by the removal are deleted as well, stopping at
/// the repository root. Returns `false` if the file did not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn delete_page_file(root: &Path, rel_path: &str) -> SyncResult<bool> {
    let full_path = page_file_path(root, rel_path)?;

    match fs::remove_file(&full_path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    let mut dir = full_path.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        // `remove_dir` fails on non-empty directories, which ends the walk.
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }

    Ok(true)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

/// List every Markdown file under the repository root.
///
/// Hidden directories (`.git` and friends) are not descended into. Paths are
/// relative to the root with `/` separators, sorted. Entries that cannot be
/// read are logged and skipped.
///
/// # Errors
///
/// Returns `RepositoryMissing` if the root is not a directory.
pub fn scan_markdown_files(root: &Path) -> SyncResult<Vec<String>> {
    if !root.is_dir() {
        return Err(SyncError::RepositoryMissing(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden_dir(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during scan");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(rel) = rel.to_str() else {
            warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            continue;
        };
        if rel.ends_with(MARKDOWN_EXT) {
            files.push(rel.replace('\\', "/"));
        }
    }

    files.sort();
    Ok(files)
}

/// Generate .gitignore content for the repository root.
#[must_use]
pub fn gitignore_content() -> &'static str {
    r"# docsync working files
.docsync.lock
*.md.tmp
"
}

/// Ensure .gitignore exists in the repository root.
///
/// If the file already exists, it is not modified (user may have customized it).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_gitignore(root: &Path) -> SyncResult<()> {
    let gitignore_path = root.join(".gitignore");

    if gitignore_path.exists() {
        return Ok(());
    }

    ensure_dir(root)?;

    let mut file = File::create(&gitignore_path)?;
    file.write_all(gitignore_content().as_bytes())?;
    file.sync_all()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(title: &str) -> Frontmatter {
        Frontmatter {
            title: title.to_string(),
            author: Some("alice".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("page.md");

        atomic_write(&path, "line 1\nline 2\n").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "line 1\nline 2\n");
        assert!(!temp_dir.path().join("page.md.tmp").exists());
    }

    #[test]
    fn test_write_then_read_page_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("repo");

        write_page_file(&root, "guides/setup.md", &meta("Setup"), "# Setup\n\nSteps.").unwrap();

        let raw = fs::read_to_string(root.join("guides/setup.md")).unwrap();
        assert!(raw.starts_with("---\ntitle: Setup\n"));

        match read_page_file(&root, "guides/setup.md").unwrap() {
            ReadOutcome::Found { metadata, body } => {
                assert_eq!(metadata.get("title").map(String::as_str), Some("Setup"));
                assert_eq!(body, "# Setup\n\nSteps.");
            }
            ReadOutcome::NotFound => panic!("file should exist"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_write_relaxes_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        write_page_file(&root, "a/b.md", &meta("B"), "body").unwrap();

        let file_mode = fs::metadata(root.join("a/b.md")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, FILE_MODE);
        let dir_mode = fs::metadata(root.join("a")).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, DIR_MODE);
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = read_page_file(temp_dir.path(), "nope.md").unwrap();
        assert_eq!(outcome, ReadOutcome::NotFound);
    }

    #[test]
    fn test_page_file_path_rejects_escapes() {
        let root = Path::new("/repo");
        assert!(page_file_path(root, "../etc/passwd.md").is_err());
        assert!(page_file_path(root, "/abs.md").is_err());
        assert!(page_file_path(root, "").is_err());
        assert_eq!(page_file_path(root, "a/b.md").unwrap(), root.join("a/b.md"));
    }

    #[test]
    fn test_delete_page_file_prunes_empty_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        write_page_file(&root, "a/b/c.md", &meta("C"), "x").unwrap();
        write_page_file(&root, "a/keep.md", &meta("Keep"), "y").unwrap();

        assert!(delete_page_file(&root, "a/b/c.md").unwrap());
        assert!(!root.join("a/b").exists());
        assert!(root.join("a").exists(), "non-empty directory stays");
        assert!(!delete_page_file(&root, "a/b/c.md").unwrap());
    }

    #[test]
    fn test_scan_skips_git_and_non_markdown() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git/refs")).unwrap();
        fs::write(root.join(".git/refs/notes.md"), "x").unwrap();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("guides/setup.md"), "x").unwrap();
        fs::write(root.join("guides.md"), "x").unwrap();
        fs::write(root.join("image.png"), "x").unwrap();

        let files = scan_markdown_files(root).unwrap();
        assert_eq!(files, vec!["guides.md".to_string(), "guides/setup.md".to_string()]);
    }

    #[test]
    fn test_scan_missing_root() {
        let result = scan_markdown_files(Path::new("/nonexistent/docsync/repo"));
        assert!(matches!(result, Err(SyncError::RepositoryMissing(_))));
    }

    #[test]
    fn test_ensure_gitignore_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let gitignore_path = temp_dir.path().join(".gitignore");

        ensure_gitignore(temp_dir.path()).unwrap();
        assert!(fs::read_to_string(&gitignore_path).unwrap().contains(".docsync.lock"));

        fs::write(&gitignore_path, "# Custom content\n").unwrap();
        ensure_gitignore(temp_dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&gitignore_path).unwrap(), "# Custom content\n");
    }
}
