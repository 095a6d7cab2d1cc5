//! Slug and file path derivation.
//!
//! A page's file path is a pure function of its title chain:
//! `slug(root)/slug(child)/.../slug(page).md`. Root pages live at
//! `slug(title).md`, and a page's directory always equals its parent's
//! path minus the `.md` extension.

use std::sync::LazyLock;

use regex::Regex;

/// Extension appended to the final path segment.
pub const MARKDOWN_EXT: &str = ".md";

static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug strip regex"));
static COLLAPSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid slug collapse regex"));

/// Turn a title into a lower-case, hyphenated path segment.
///
/// Characters outside word characters, whitespace and hyphens are dropped,
/// then runs of whitespace, underscores and hyphens collapse into a single
/// hyphen. Leading and trailing hyphens are trimmed. An empty title yields
/// an empty slug.
#[must_use]
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = STRIP_RE.replace_all(&lowered, "");
    let collapsed = COLLAPSE_RE.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

/// Derive the relative file path for a title chain ordered root to leaf.
///
/// The last title is the page's own title. An empty chain yields `.md`,
/// same as a page with an empty title.
#[must_use]
pub fn derive_path<S: AsRef<str>>(titles: &[S]) -> String {
    let segments: Vec<String> = titles.iter().map(|t| slugify(t.as_ref())).collect();
    format!("{}{MARKDOWN_EXT}", segments.join("/"))
}

/// Path of a child page given its parent's path and its own title.
#[must_use]
pub fn child_path(parent_path: &str, title: &str) -> String {
    let parent_dir = parent_path.strip_suffix(MARKDOWN_EXT).unwrap_or(parent_path);
    format!("{parent_dir}/{}{MARKDOWN_EXT}", slugify(title))
}

/// Containing directory of a relative path (`""` for root-level files).
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Path the parent page must have for a page stored at `path`.
///
/// `guides/setup.md` expects `guides.md`; `a/b/c.md` expects `a/b.md`.
/// Root-level paths have no parent and return `None`.
#[must_use]
pub fn expected_parent_path(path: &str) -> Option<String> {
    let dir = parent_dir(path);
    if dir.is_empty() {
        None
    } else {
        Some(format!("{dir}{MARKDOWN_EXT}"))
    }
}

/// Title derived from a file name when no frontmatter title exists.
#[must_use]
pub fn title_from_path(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .strip_suffix(MARKDOWN_EXT)
        .unwrap_or(file_name)
        .to_string()
}

/// Lexically normalise a repository-relative path, resolving `.` and `..`.
///
/// Empty segments, including a leading `/`, are skipped. Returns `None` when
/// a `..` would climb above the repository root.
#[must_use]
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("  Setup  "), "setup");
    }

    #[test]
    fn test_slugify_punctuation_and_case() {
        assert_eq!(slugify("Hello, World! (v2)"), "hello-world-v2");
        assert_eq!(slugify("API -- Reference__Guide"), "api-reference-guide");
        assert_eq!(slugify("-Leading and trailing-"), "leading-and-trailing");
    }

    #[test]
    fn test_slugify_only_word_chars_and_single_hyphens() {
        for title in ["A  B", "x_-_y", "What? Why! How.", "Tabs\tand\nnewlines", "ÜBER Straße"] {
            let slug = slugify(title);
            assert!(!slug.contains("--"), "double hyphen in {slug}");
            assert!(!slug.starts_with('-') && !slug.ends_with('-'), "edge hyphen in {slug}");
            assert!(
                slug.chars().all(|c| c == '-' || c.is_alphanumeric()),
                "unexpected char in {slug}"
            );
            assert_eq!(slug, slug.to_lowercase());
        }
    }

    #[test]
    fn test_slugify_empty_title() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(derive_path(&[""]), ".md");
    }

    #[test]
    fn test_derive_path_hierarchy() {
        assert_eq!(derive_path(&["Setup"]), "setup.md");
        assert_eq!(derive_path(&["Guides", "Setup"]), "guides/setup.md");
        assert_eq!(
            derive_path(&["Docs Root", "Guides", "First Steps"]),
            "docs-root/guides/first-steps.md"
        );
    }

    #[test]
    fn test_derive_path_deterministic() {
        let titles = ["Ops Manual", "On Call"];
        assert_eq!(derive_path(&titles), derive_path(&titles));
    }

    #[test]
    fn test_child_path_matches_derive_path() {
        let parent = derive_path(&["Guides"]);
        assert_eq!(child_path(&parent, "Setup"), derive_path(&["Guides", "Setup"]));
    }

    #[test]
    fn test_expected_parent_path() {
        assert_eq!(expected_parent_path("guides/setup.md").as_deref(), Some("guides.md"));
        assert_eq!(expected_parent_path("a/b/c.md").as_deref(), Some("a/b.md"));
        assert_eq!(expected_parent_path("root.md"), None);
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path("guides/Sedes Oficiales.md"), "Sedes Oficiales");
        assert_eq!(title_from_path("setup.md"), "setup");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("guides/./setup.md").unwrap(), "guides/setup.md");
        assert_eq!(normalize("guides/../faq.md").unwrap(), "faq.md");
        assert_eq!(normalize("/guides/setup.md").unwrap(), "guides/setup.md");
        assert_eq!(normalize("guides/setup/../../faq.md").unwrap(), "faq.md");
    }

    #[test]
    fn test_normalize_rejects_climbing_above_root() {
        assert_eq!(normalize("../outside.md"), None);
        assert_eq!(normalize("guides/../../outside.md"), None);
        assert_eq!(normalize("/../outside.md"), None);
    }
}
