//! Page model.
//!
//! Pages form a tree through `parent_id`. `file_path`, `body_html` and the
//! outbound link set are derived fields: the store recomputes them
//! explicitly after the title, parent or content changes.

use serde::{Deserialize, Serialize};

use crate::sync::frontmatter::Frontmatter;

/// Default ordering position among siblings.
pub const DEFAULT_SEQUENCE: i64 = 10;

/// A documentation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Store-assigned identifier, never reused after deletion.
    pub id: i64,

    /// Title, unique across the whole collection.
    pub title: String,

    /// Parent page; `None` for roots.
    pub parent_id: Option<i64>,

    /// Position among siblings (lower first).
    pub sequence: i64,

    /// Markdown source of truth.
    pub content_md: String,

    /// Rendered HTML fragment (derived).
    pub body_html: String,

    /// Relative file path inside the repository (derived).
    pub file_path: String,

    /// Number of content edits.
    pub edit_count: i64,

    /// Actor of the last content edit.
    pub last_editor: Option<String>,

    /// Actor that created the page.
    pub created_by: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Page {
    /// True for pages without a parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Frontmatter written at the top of this page's file.
    #[must_use]
    pub fn frontmatter(&self) -> Frontmatter {
        Frontmatter {
            title: self.title.clone(),
            author: Some(self.created_by.clone()),
            created_at: Some(format_timestamp(self.created_at)),
            last_editor: self.last_editor.clone(),
            last_edited_at: Some(format_timestamp(self.updated_at)),
        }
    }
}

/// Input for creating a page.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub title: String,
    pub parent_id: Option<i64>,
    pub sequence: Option<i64>,
    pub content_md: String,
    /// Take this path verbatim instead of deriving it from the title chain.
    ///
    /// Used when importing a file so the record matches its disk location.
    pub file_path: Option<String>,
}

impl NewPage {
    /// A new root page with the given title and content.
    #[must_use]
    pub fn new(title: impl Into<String>, content_md: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content_md: content_md.into(),
            ..Default::default()
        }
    }

    /// Place the page under `parent_id`.
    #[must_use]
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Respect an on-disk path instead of deriving one.
    #[must_use]
    pub fn at_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// A path change produced by a rename or move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathChange {
    pub id: i64,
    pub old_path: String,
    pub new_path: String,
}

/// Ancestor entry for breadcrumb display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub id: i64,
    pub title: String,
}

/// Node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageNode {
    pub id: i64,
    pub title: String,
    pub file_path: String,
    pub children: Vec<PageNode>,
}

/// Format a Unix millisecond timestamp as RFC 3339.
#[must_use]
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page {
            id: 7,
            title: "Setup".to_string(),
            parent_id: None,
            sequence: DEFAULT_SEQUENCE,
            content_md: "# Setup".to_string(),
            body_html: "<h1>Setup</h1>".to_string(),
            file_path: "setup.md".to_string(),
            edit_count: 0,
            last_editor: None,
            created_by: "alice".to_string(),
            created_at: 0,
            updated_at: 86_400_000,
        }
    }

    #[test]
    fn test_frontmatter_from_page() {
        let fm = page().frontmatter();
        assert_eq!(fm.title, "Setup");
        assert_eq!(fm.author.as_deref(), Some("alice"));
        assert_eq!(fm.created_at.as_deref(), Some("1970-01-01T00:00:00+00:00"));
        assert_eq!(fm.last_edited_at.as_deref(), Some("1970-01-02T00:00:00+00:00"));
        assert!(fm.last_editor.is_none());
    }

    #[test]
    fn test_new_page_builder() {
        let new = NewPage::new("Child", "body").with_parent(3).at_path("a/child.md");
        assert_eq!(new.parent_id, Some(3));
        assert_eq!(new.file_path.as_deref(), Some("a/child.md"));
        assert!(page().is_root());
    }
}
