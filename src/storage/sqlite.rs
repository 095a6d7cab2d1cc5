//! SQLite storage implementation.
//!
//! This module provides the page store for docsync using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.
//!
//! Derived page fields (`file_path`, `body_html`, the `page_links` rows) are
//! recomputed explicitly inside the mutation that invalidates them.

use crate::error::{Error, Result};
use crate::model::{Breadcrumb, NewPage, Page, PageNode, PathChange, DEFAULT_SEQUENCE};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::sync::convert::{extract_links, html_to_markdown, markdown_to_html, PathResolver};
use crate::sync::slug::{child_path, derive_path};
use rusqlite::{Connection, OptionalExtension, Params, Transaction};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const PAGE_COLUMNS: &str = "id, title, parent_id, sequence, content_md, body_html, file_path, \
                            edit_count, last_editor, created_by, created_at, updated_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// This struct is passed to mutation closures to record audit events,
/// which are written just before the transaction commits.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (user name, sync job, etc.).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(&self.op_name));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Page Mutations
    // ==================

    /// Create a page.
    ///
    /// The title is made unique with a ` (n)` suffix when taken. The file
    /// path is derived from the title chain unless `new.file_path` pins it.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the parent does not exist, or a database error.
    pub fn create_page(&mut self, new: &NewPage, actor: &str) -> Result<Page> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("create_page", actor, |tx, ctx| {
            let title = unique_title_in(tx, &new.title, None)?;
            if title != new.title {
                info!(requested = %new.title, assigned = %title, "Title taken, using suffixed title");
            }

            if let Some(parent_id) = new.parent_id {
                require_page(tx, parent_id)?;
            }
            let file_path = match &new.file_path {
                Some(path) => path.clone(),
                None => derive_page_path(tx, new.parent_id, &title)?,
            };

            tx.execute(
                "INSERT INTO pages (title, parent_id, sequence, content_md, file_path, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    title,
                    new.parent_id,
                    new.sequence.unwrap_or(DEFAULT_SEQUENCE),
                    new.content_md,
                    file_path,
                    actor,
                    now
                ],
            )?;
            let id = tx.last_insert_rowid();

            refresh_derived(tx, id, &new.content_md, &file_path)?;
            warn_on_collision(tx, id, &file_path)?;

            ctx.record_change("page", &id.to_string(), EventType::PageCreated, None, Some(title));
            require_page(tx, id)
        })
    }

    /// Replace a page's Markdown content.
    ///
    /// Re-renders HTML, recomputes links, increments `edit_count` and sets
    /// `last_editor`. Returns `false` without touching anything when the
    /// content is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn update_content(&mut self, id: i64, markdown: &str, actor: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("update_content", actor, |tx, ctx| {
            let page = require_page(tx, id)?;
            if page.content_md == markdown {
                return Ok(false);
            }

            tx.execute(
                "UPDATE pages SET content_md = ?1, edit_count = edit_count + 1, last_editor = ?2, updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![markdown, actor, now, id],
            )?;
            refresh_derived(tx, id, markdown, &page.file_path)?;

            ctx.record_event("page", &id.to_string(), EventType::PageEdited);
            Ok(true)
        })
    }

    /// Replace a page's content from edited HTML.
    ///
    /// The HTML is converted to Markdown; if conversion fails the previous
    /// content is kept and nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn update_html(&mut self, id: i64, html: &str, actor: &str) -> Result<bool> {
        let page = self.get_page(id)?.ok_or_else(|| not_found(id))?;
        let conversion = html_to_markdown(html, &page.content_md);
        if let Some(warning) = &conversion.warning {
            warn!(page_id = id, %warning, "Keeping previous content");
        }
        self.update_content(id, &conversion.content, actor)
    }

    /// Rename a page.
    ///
    /// Recomputes the path of the page and every descendant, returning the
    /// path changes so the caller can move files.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn rename_page(&mut self, id: i64, title: &str, actor: &str) -> Result<Vec<PathChange>> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("rename_page", actor, |tx, ctx| {
            let page = require_page(tx, id)?;
            if page.title == title {
                return Ok(Vec::new());
            }

            let new_title = unique_title_in(tx, title, Some(id))?;
            tx.execute(
                "UPDATE pages SET title = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![new_title, now, id],
            )?;

            let changes = recompute_paths(tx, id)?;
            ctx.record_change(
                "page",
                &id.to_string(),
                EventType::PageRenamed,
                Some(page.title),
                Some(new_title),
            );
            Ok(changes)
        })
    }

    /// Move a page under a new parent (or to the root with `None`).
    ///
    /// # Errors
    ///
    /// Returns `CycleDetected` if the new parent is the page itself or one
    /// of its descendants, `PageNotFound` for unknown ids, or a database error.
    pub fn move_page(
        &mut self,
        id: i64,
        new_parent: Option<i64>,
        actor: &str,
    ) -> Result<Vec<PathChange>> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("move_page", actor, |tx, ctx| {
            let page = require_page(tx, id)?;
            if let Some(parent_id) = new_parent {
                require_page(tx, parent_id)?;
                if is_in_subtree(tx, id, parent_id)? {
                    return Err(Error::CycleDetected {
                        id,
                        parent: parent_id,
                    });
                }
            }
            if page.parent_id == new_parent {
                return Ok(Vec::new());
            }

            tx.execute(
                "UPDATE pages SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![new_parent, now, id],
            )?;

            let changes = recompute_paths(tx, id)?;
            ctx.record_change(
                "page",
                &id.to_string(),
                EventType::PageMoved,
                page.parent_id.map(|p| p.to_string()),
                new_parent.map(|p| p.to_string()),
            );
            Ok(changes)
        })
    }

    /// Change a page's parent without recomputing any path.
    ///
    /// Used when the on-disk layout already dictates where the page lives.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn set_parent_raw(&mut self, id: i64, parent: Option<i64>, actor: &str) -> Result<()> {
        self.mutate("set_parent_raw", actor, |tx, ctx| {
            let page = require_page(tx, id)?;
            tx.execute(
                "UPDATE pages SET parent_id = ?1 WHERE id = ?2",
                rusqlite::params![parent, id],
            )?;
            ctx.record_change(
                "page",
                &id.to_string(),
                EventType::PageMoved,
                page.parent_id.map(|p| p.to_string()),
                parent.map(|p| p.to_string()),
            );
            Ok(())
        })
    }

    /// Set a page's position among its siblings.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn set_sequence(&mut self, id: i64, sequence: i64, actor: &str) -> Result<()> {
        self.mutate("set_sequence", actor, |tx, ctx| {
            let page = require_page(tx, id)?;
            tx.execute(
                "UPDATE pages SET sequence = ?1 WHERE id = ?2",
                rusqlite::params![sequence, id],
            )?;
            ctx.record_change(
                "page",
                &id.to_string(),
                EventType::PageReordered,
                Some(page.sequence.to_string()),
                Some(sequence.to_string()),
            );
            Ok(())
        })
    }

    /// Delete a page and all of its descendants.
    ///
    /// Descendants are collected by traversal and removed deepest first.
    /// Returns the removed pages, the requested page first, so the caller
    /// can clean up their files.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn delete_page(&mut self, id: i64, actor: &str) -> Result<Vec<Page>> {
        self.mutate("delete_page", actor, |tx, ctx| {
            require_page(tx, id)?;

            let mut removed = Vec::new();
            for page_id in subtree_ids(tx, id)? {
                removed.push(require_page(tx, page_id)?);
            }

            for page in removed.iter().rev() {
                tx.execute("DELETE FROM pages WHERE id = ?1", [page.id])?;
                ctx.record_change(
                    "page",
                    &page.id.to_string(),
                    EventType::PageDeleted,
                    Some(page.title.clone()),
                    None,
                );
            }

            debug!(page_id = id, removed = removed.len(), "Deleted page subtree");
            Ok(removed)
        })
    }

    // ==================
    // Page Queries
    // ==================

    /// Get a page by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_page(&self, id: i64) -> Result<Option<Page>> {
        fetch_page(&self.conn, id)
    }

    /// Get the page stored at an exact relative file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_page_by_path(&self, path: &str) -> Result<Option<Page>> {
        Ok(query_pages(&self.conn, "WHERE file_path = ?1 ORDER BY id LIMIT 1", [path])?
            .into_iter()
            .next())
    }

    /// Get a page by exact title.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_page_by_title(&self, title: &str) -> Result<Option<Page>> {
        Ok(query_pages(&self.conn, "WHERE title = ?1", [title])?
            .into_iter()
            .next())
    }

    /// Titles containing `query` (ASCII case-insensitive), for suggestions.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_similar_titles(&self, query: &str, limit: u32) -> Result<Vec<String>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let mut stmt = self.conn.prepare(
            "SELECT title FROM pages WHERE title LIKE ?1 ESCAPE '\\' ORDER BY title LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![format!("%{escaped}%"), limit], |row| {
            row.get(0)
        })?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(Into::into)
    }

    /// All pages, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        query_pages(&self.conn, "ORDER BY id", rusqlite::params![])
    }

    /// Direct children of a page, ordered by sequence then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_children(&self, parent_id: i64) -> Result<Vec<Page>> {
        children_of(&self.conn, parent_id)
    }

    /// Pages without a parent, ordered by sequence then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn root_pages(&self) -> Result<Vec<Page>> {
        query_pages(
            &self.conn,
            "WHERE parent_id IS NULL ORDER BY sequence, id",
            rusqlite::params![],
        )
    }

    /// Number of pages in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn page_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Pages this page links to through `doc://`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn linked_pages(&self, id: i64) -> Result<Vec<Page>> {
        query_pages(
            &self.conn,
            "WHERE id IN (SELECT target_id FROM page_links WHERE source_id = ?1) ORDER BY title",
            [id],
        )
    }

    /// Pages that link to this page.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn backlinks(&self, id: i64) -> Result<Vec<Page>> {
        query_pages(
            &self.conn,
            "WHERE id IN (SELECT source_id FROM page_links WHERE target_id = ?1) ORDER BY title",
            [id],
        )
    }

    /// Ancestor chain from the root down to the page's parent.
    ///
    /// # Errors
    ///
    /// Returns `PageNotFound` if the page does not exist, or a database error.
    pub fn breadcrumbs(&self, id: i64) -> Result<Vec<Breadcrumb>> {
        let page = require_page(&self.conn, id)?;

        let mut crumbs = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = page.parent_id;
        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                warn!(page_id = id, "Parent chain loops, truncating breadcrumbs");
                break;
            }
            let Some(parent) = fetch_page(&self.conn, parent_id)? else {
                break;
            };
            crumbs.push(Breadcrumb {
                id: parent.id,
                title: parent.title,
            });
            current = parent.parent_id;
        }

        crumbs.reverse();
        Ok(crumbs)
    }

    /// The whole page hierarchy, siblings ordered by sequence then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn nav_tree(&self) -> Result<Vec<PageNode>> {
        let pages = query_pages(&self.conn, "ORDER BY sequence, id", rusqlite::params![])?;

        let mut children: HashMap<Option<i64>, Vec<&Page>> = HashMap::new();
        for page in &pages {
            children.entry(page.parent_id).or_default().push(page);
        }

        let mut seen = HashSet::new();
        Ok(build_nav(None, &children, &mut seen))
    }

    /// The title `title` would receive, ignoring page `exclude_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn unique_title(&self, title: &str, exclude_id: Option<i64>) -> Result<String> {
        unique_title_in(&self.conn, title, exclude_id)
    }

    /// Audit history of a page, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn page_events(&self, id: i64, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, "page", &id.to_string(), limit)?)
    }

    // ==================
    // Settings
    // ==================

    /// Read a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_setting(&mut self, key: &str, value: &str, actor: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("set_setting", actor, |tx, ctx| {
            let old: Option<String> = tx
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;

            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, now],
            )?;

            ctx.record_change(
                "setting",
                key,
                EventType::SettingChanged,
                old,
                Some(value.to_string()),
            );
            Ok(())
        })
    }
}

impl PathResolver for SqliteStorage {
    fn page_id_for_path(&self, path: &str) -> Option<i64> {
        ConnResolver(&self.conn).page_id_for_path(path)
    }
}

// ==================
// Helpers shared by queries and mutations
// ==================

/// Path lookups against a live connection (or open transaction).
struct ConnResolver<'a>(&'a Connection);

impl PathResolver for ConnResolver<'_> {
    fn page_id_for_path(&self, path: &str) -> Option<i64> {
        self.0
            .query_row(
                "SELECT id FROM pages WHERE file_path = ?1 ORDER BY id LIMIT 1",
                [path],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                debug!(error = %e, path, "Path lookup failed");
                None
            })
    }
}

fn map_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        title: row.get(1)?,
        parent_id: row.get(2)?,
        sequence: row.get(3)?,
        content_md: row.get(4)?,
        body_html: row.get(5)?,
        file_path: row.get(6)?,
        edit_count: row.get(7)?,
        last_editor: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn query_pages<P: Params>(conn: &Connection, clause: &str, params: P) -> Result<Vec<Page>> {
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages {clause}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, map_page)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

fn fetch_page(conn: &Connection, id: i64) -> Result<Option<Page>> {
    Ok(query_pages(conn, "WHERE id = ?1", [id])?.into_iter().next())
}

fn not_found(id: i64) -> Error {
    Error::PageNotFound { id: id.to_string() }
}

fn require_page(conn: &Connection, id: i64) -> Result<Page> {
    fetch_page(conn, id)?.ok_or_else(|| not_found(id))
}

fn children_of(conn: &Connection, parent_id: i64) -> Result<Vec<Page>> {
    query_pages(
        conn,
        "WHERE parent_id = ?1 ORDER BY sequence, id",
        [parent_id],
    )
}

fn title_taken(conn: &Connection, title: &str, exclude_id: Option<i64>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pages WHERE title = ?1 AND id IS NOT ?2)",
        rusqlite::params![title, exclude_id],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// `title`, or `title (n)` with the smallest free `n` starting at 1.
fn unique_title_in(conn: &Connection, title: &str, exclude_id: Option<i64>) -> Result<String> {
    if !title_taken(conn, title, exclude_id)? {
        return Ok(title.to_string());
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{title} ({n})");
        if !title_taken(conn, &candidate, exclude_id)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Path for a page titled `title` under `parent_id`.
fn derive_page_path(conn: &Connection, parent_id: Option<i64>, title: &str) -> Result<String> {
    match parent_id {
        Some(parent_id) => {
            let parent = require_page(conn, parent_id)?;
            Ok(child_path(&parent.file_path, title))
        }
        None => Ok(derive_path(&[title])),
    }
}

/// Re-render HTML and rebuild the outbound link set from `content`.
fn refresh_derived(conn: &Connection, id: i64, content: &str, file_path: &str) -> Result<()> {
    let current = (!file_path.is_empty()).then_some(file_path);
    let conversion = markdown_to_html(content, current, &ConnResolver(conn));
    if let Some(warning) = &conversion.warning {
        warn!(page_id = id, %warning, "Rendered placeholder HTML");
    }
    conn.execute(
        "UPDATE pages SET body_html = ?1 WHERE id = ?2",
        rusqlite::params![conversion.content, id],
    )?;

    conn.execute("DELETE FROM page_links WHERE source_id = ?1", [id])?;
    for target in extract_links(content, Some(id)) {
        // Links to unknown pages are dropped.
        conn.execute(
            "INSERT OR IGNORE INTO page_links (source_id, target_id) SELECT ?1, id FROM pages WHERE id = ?2",
            rusqlite::params![id, target],
        )?;
    }
    Ok(())
}

/// Recompute paths for `start` and all its descendants, top-down.
fn recompute_paths(conn: &Connection, start: i64) -> Result<Vec<PathChange>> {
    let page = require_page(conn, start)?;
    let path = derive_page_path(conn, page.parent_id, &page.title)?;

    let mut changes = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([(page, path)]);

    while let Some((page, new_path)) = queue.pop_front() {
        if !seen.insert(page.id) {
            continue;
        }

        if page.file_path != new_path {
            conn.execute(
                "UPDATE pages SET file_path = ?1 WHERE id = ?2",
                rusqlite::params![new_path, page.id],
            )?;
            refresh_derived(conn, page.id, &page.content_md, &new_path)?;
            warn_on_collision(conn, page.id, &new_path)?;
            changes.push(PathChange {
                id: page.id,
                old_path: page.file_path.clone(),
                new_path: new_path.clone(),
            });
        }

        for child in children_of(conn, page.id)? {
            let child_new = child_path(&new_path, &child.title);
            queue.push_back((child, child_new));
        }
    }

    Ok(changes)
}

/// Titles that differ only in punctuation or case slug to the same path.
fn warn_on_collision(conn: &Connection, id: i64, file_path: &str) -> Result<()> {
    let other: Option<i64> = conn
        .query_row(
            "SELECT id FROM pages WHERE file_path = ?1 AND id != ?2 LIMIT 1",
            rusqlite::params![file_path, id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(other) = other {
        warn!(page_id = id, other_id = other, path = file_path, "Two pages share one file path");
    }
    Ok(())
}

fn build_nav(
    parent: Option<i64>,
    children: &HashMap<Option<i64>, Vec<&Page>>,
    seen: &mut HashSet<i64>,
) -> Vec<PageNode> {
    let Some(list) = children.get(&parent) else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(list.len());
    for page in list {
        if !seen.insert(page.id) {
            continue;
        }
        nodes.push(PageNode {
            id: page.id,
            title: page.title.clone(),
            file_path: page.file_path.clone(),
            children: build_nav(Some(page.id), children, seen),
        });
    }
    nodes
}

/// `root` followed by all its descendants in breadth-first order.
fn subtree_ids(conn: &Connection, root: i64) -> Result<Vec<i64>> {
    let mut ids = vec![root];
    let mut seen = HashSet::from([root]);
    let mut idx = 0;
    while idx < ids.len() {
        for child in children_of(conn, ids[idx])? {
            if seen.insert(child.id) {
                ids.push(child.id);
            }
        }
        idx += 1;
    }
    Ok(ids)
}

/// True if `candidate` is `root` or lies below it.
fn is_in_subtree(conn: &Connection, root: i64, candidate: i64) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut current = Some(candidate);
    while let Some(id) = current {
        if id == root {
            return Ok(true);
        }
        if !seen.insert(id) {
            return Ok(false);
        }
        current = fetch_page(conn, id)?.and_then(|p| p.parent_id);
    }
    Ok(false)
}
