//! Frontmatter codec for page files.
//!
//! Files start with a small `key: value` header between `---` lines:
//!
//! ```text
//! ---
//! title: Setup
//! author: alice
//! created_at: 2025-01-20T10:00:00+00:00
//! last_editor: bob
//! last_edited_at: 2025-01-21T08:30:00+00:00
//! ---
//!
//! # Setup
//! ```
//!
//! Parsing never fails. A missing or malformed header degrades to an
//! empty metadata map with the whole input treated as body.

use std::collections::BTreeMap;

const DELIMITER: &str = "---";

/// Metadata written at the top of every page file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    pub title: String,
    pub author: Option<String>,
    pub created_at: Option<String>,
    pub last_editor: Option<String>,
    pub last_edited_at: Option<String>,
}

impl Frontmatter {
    /// Build frontmatter from a parsed metadata map.
    ///
    /// Returns `None` when the map carries no `title`.
    #[must_use]
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Option<Self> {
        let title = metadata.get("title")?.clone();
        Some(Self {
            title,
            author: metadata.get("author").cloned(),
            created_at: metadata.get("created_at").cloned(),
            last_editor: metadata.get("last_editor").cloned(),
            last_edited_at: metadata.get("last_edited_at").cloned(),
        })
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("title", Some(self.title.as_str())),
            ("author", self.author.as_deref()),
            ("created_at", self.created_at.as_deref()),
            ("last_editor", self.last_editor.as_deref()),
            ("last_edited_at", self.last_edited_at.as_deref()),
        ]
    }
}

/// Result of splitting a file into metadata and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

impl ParsedDocument {
    /// Title recorded in the header, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .get("title")
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Serialize frontmatter followed by the raw Markdown body.
///
/// Absent optional fields are skipped.
#[must_use]
pub fn serialize(frontmatter: &Frontmatter, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in frontmatter.fields() {
        if let Some(value) = value {
            out.push_str(key);
            out.push_str(": ");
            // Values are single-line; embedded newlines would end the header.
            out.push_str(&value.replace(['\r', '\n'], " "));
            out.push('\n');
        }
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body);
    out
}

/// Split file content into header metadata and body.
///
/// The header is recognised only when the content begins with `---` and a
/// later line starts with `---`. Each header line is split at the first
/// colon with both sides trimmed; lines without a colon are ignored. The
/// body is everything after the closing delimiter line, trimmed.
#[must_use]
pub fn parse(content: &str) -> ParsedDocument {
    let unparsed = || ParsedDocument {
        metadata: BTreeMap::new(),
        body: content.to_string(),
    };

    let Some(rest) = content.strip_prefix(DELIMITER) else {
        return unparsed();
    };
    let Some(close) = rest.find("\n---") else {
        return unparsed();
    };

    let header = &rest[..close];
    let after = &rest[close + 1 + DELIMITER.len()..];
    // Drop the remainder of the closing delimiter line.
    let body = after.split_once('\n').map_or("", |(_, body)| body);

    let metadata = header
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    ParsedDocument {
        metadata,
        body: body.trim().to_string(),
    }
}
