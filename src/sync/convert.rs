//! Markdown and HTML content conversion.
//!
//! Pages store Markdown as the source of truth and carry a rendered HTML
//! fragment for display. Internal links exist in three encodings:
//!
//! - `doc://<id>`: authoritative, id-based, survives renames
//! - relative or absolute `.md` paths: resolved by path lookup at render time
//! - navigation URLs (`/web#action=docsync.page&active_id=<id>`): what the
//!   rendering surface links to
//!
//! The two directions are not inverses of each other. Round-tripping is
//! best-effort because Markdown and HTML are not isomorphic.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::sync::slug::{normalize, parent_dir};

/// Prefix of navigation URLs; the page id is appended.
pub const NAV_URL_PREFIX: &str = "/web#action=docsync.page&active_id=";

/// Placeholder shown when Markdown cannot be rendered.
pub const RENDER_ERROR_HTML: &str = "<p>Error rendering content</p>";

/// Inputs larger than this are not rendered.
pub const MAX_RENDER_BYTES: usize = 8 * 1024 * 1024;

static DOC_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(doc://([0-9]+)\)").expect("valid doc link regex")
});
static FILE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(([^)]+\.md)\)").expect("valid file link regex")
});
static NAV_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\(/web#[^)\s]*?active_id=([0-9]+)\)").expect("valid nav link regex")
});
static DOC_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"doc://([0-9]+)").expect("valid doc reference regex"));

static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("valid body regex"));
static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head\b[^>]*>.*?</head>").expect("valid head regex"));
static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!?doctype[^>]*>").expect("valid doctype regex"));
static WRAPPER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:html|head|meta|title|link)\b[^>]*>").expect("valid wrapper tag regex")
});

/// Outcome of a best-effort conversion.
///
/// A degraded conversion still carries usable content (a placeholder or the
/// previous value) plus a warning the caller may log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub content: String,
    pub warning: Option<String>,
}

impl Conversion {
    fn ok(content: String) -> Self {
        Self {
            content,
            warning: None,
        }
    }

    fn degraded(content: String, warning: String) -> Self {
        Self {
            content,
            warning: Some(warning),
        }
    }

    /// True when the converter fell back instead of converting.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Lookup of page ids by exact relative file path.
pub trait PathResolver {
    fn page_id_for_path(&self, path: &str) -> Option<i64>;
}

impl PathResolver for HashMap<String, i64> {
    fn page_id_for_path(&self, path: &str) -> Option<i64> {
        self.get(path).copied()
    }
}

/// Resolver that knows no paths; only `doc://` links are rewritten.
pub struct NoPaths;

impl PathResolver for NoPaths {
    fn page_id_for_path(&self, _path: &str) -> Option<i64> {
        None
    }
}

/// Navigation URL for a page id.
#[must_use]
pub fn navigation_url(page_id: i64) -> String {
    format!("{NAV_URL_PREFIX}{page_id}")
}

/// Rewrite `doc://` and `.md` path links to navigation URLs.
///
/// Path links are resolved by exact match against page paths first. When
/// that fails and `current_path` is known, the link is resolved relative to
/// the current page's directory and matched again. Unresolvable links are
/// left untouched.
pub fn resolve_links_to_navigation(
    markdown: &str,
    current_path: Option<&str>,
    resolver: &dyn PathResolver,
) -> String {
    let with_ids = DOC_LINK_RE.replace_all(markdown, |caps: &Captures<'_>| {
        format!("[{}]({NAV_URL_PREFIX}{})", &caps[1], &caps[2])
    });

    FILE_LINK_RE
        .replace_all(&with_ids, |caps: &Captures<'_>| {
            let target = &caps[2];
            if target.contains("://") {
                return caps[0].to_string();
            }
            match resolve_path_link(target, current_path, resolver) {
                Some(id) => format!("[{}]({})", &caps[1], navigation_url(id)),
                None => {
                    debug!(target, "Unresolved file link left as-is");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn resolve_path_link(
    target: &str,
    current_path: Option<&str>,
    resolver: &dyn PathResolver,
) -> Option<i64> {
    if let Some(from_root) = target.strip_prefix('/') {
        return resolver.page_id_for_path(&normalize(from_root)?);
    }
    if let Some(id) = resolver.page_id_for_path(target) {
        return Some(id);
    }
    let current = current_path.filter(|p| !p.is_empty())?;
    let joined = format!("{}/{target}", parent_dir(current));
    resolver.page_id_for_path(&normalize(&joined)?)
}

/// Rewrite navigation URLs back to the `doc://` scheme.
#[must_use]
pub fn navigation_links_to_doc_scheme(markdown: &str) -> String {
    NAV_LINK_RE
        .replace_all(markdown, "[$1](doc://$2)")
        .into_owned()
}

/// Page ids referenced through `doc://` in raw content.
///
/// Duplicates and self-references are dropped; the result is sorted.
#[must_use]
pub fn extract_links(content: &str, self_id: Option<i64>) -> Vec<i64> {
    let ids: BTreeSet<i64> = DOC_REF_RE
        .captures_iter(content)
        .filter_map(|caps| caps[1].parse().ok())
        .filter(|id| Some(*id) != self_id)
        .collect();
    ids.into_iter().collect()
}

/// Reduce a full HTML document to its body fragment.
///
/// Input that does not look like a full document is only trimmed.
#[must_use]
pub fn clean_html_fragment(html: &str) -> String {
    let lowered = html.to_lowercase();
    let is_document =
        lowered.contains("<html") || lowered.contains("<body") || lowered.contains("<!doctype");
    if !is_document {
        return html.trim().to_string();
    }

    if let Some(caps) = BODY_RE.captures(html) {
        return caps[1].trim().to_string();
    }

    let without_head = HEAD_RE.replace_all(html, "");
    let without_doctype = DOCTYPE_RE.replace_all(&without_head, "");
    WRAPPER_TAG_RE
        .replace_all(&without_doctype, "")
        .trim()
        .to_string()
}

/// Render Markdown to an HTML fragment.
///
/// Links are rewritten first, then rendered with tables and fenced code
/// enabled and single newlines turned into `<br />`.
pub fn markdown_to_html(
    markdown: &str,
    current_path: Option<&str>,
    resolver: &dyn PathResolver,
) -> Conversion {
    if markdown.is_empty() {
        return Conversion::ok(String::new());
    }
    if markdown.len() > MAX_RENDER_BYTES {
        let warning = format!(
            "content is {} bytes, above the {MAX_RENDER_BYTES} byte render limit",
            markdown.len()
        );
        warn!(%warning, "Markdown not rendered");
        return Conversion::degraded(RENDER_ERROR_HTML.to_string(), warning);
    }

    let processed = resolve_links_to_navigation(markdown, current_path, resolver);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let events = Parser::new_ext(&processed, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut html = String::with_capacity(processed.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, events);

    Conversion::ok(clean_html_fragment(&html))
}

/// Convert an HTML fragment (or full document) back to Markdown.
///
/// Uses ATX headings and rewrites navigation URLs to `doc://` links. On
/// failure `previous` is returned unchanged as degraded content.
#[must_use]
pub fn html_to_markdown(html: &str, previous: &str) -> Conversion {
    let fragment = clean_html_fragment(html);
    if fragment.is_empty() {
        return Conversion::ok(String::new());
    }

    let converter = htmd::HtmlToMarkdown::builder()
        .options(htmd::options::Options {
            heading_style: htmd::options::HeadingStyle::Atx,
            ..Default::default()
        })
        .build();

    match converter.convert(&fragment) {
        Ok(markdown) => Conversion::ok(navigation_links_to_doc_scheme(&markdown)),
        Err(e) => {
            warn!(error = %e, "HTML to Markdown conversion failed, keeping previous content");
            Conversion::degraded(previous.to_string(), e.to_string())
        }
    }
}
