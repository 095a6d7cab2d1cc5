//! Page command implementations.
//!
//! Every mutation goes through [`SyncEngine`] so the page's file (and the
//! files of any descendants whose paths change) is rewritten right after
//! the store commits.

use crate::cli::commands::{open_engine, open_storage, read_content, resolve_page, Context};
use crate::cli::{PageCommands, PageCreateArgs, PageEditArgs};
use crate::error::{Error, Result};
use crate::model::{format_timestamp, NewPage, Page, PageNode, PathChange};
use crate::sync::SyncEngine;
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct PageListOutput {
    count: usize,
    pages: Vec<PageSummary>,
}

#[derive(Serialize)]
struct PageSummary {
    id: i64,
    title: String,
    parent_id: Option<i64>,
    sequence: i64,
    file_path: String,
    updated_at: i64,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            parent_id: page.parent_id,
            sequence: page.sequence,
            file_path: page.file_path.clone(),
            updated_at: page.updated_at,
        }
    }
}

#[derive(Serialize)]
struct PathChangeOutput<'a> {
    id: i64,
    title: &'a str,
    file_path: &'a str,
    moved: &'a [PathChange],
}

/// Execute page commands.
///
/// # Errors
///
/// Returns an error if the page cannot be resolved or the store rejects
/// the change.
pub fn execute(command: &PageCommands, ctx: &Context<'_>) -> Result<()> {
    match command {
        PageCommands::Create(args) => create(args, ctx),
        PageCommands::Show { page, html, history } => show(page, *html, *history, ctx),
        PageCommands::List { parent, limit } => list(parent.as_deref(), *limit, ctx),
        PageCommands::Tree => tree(ctx),
        PageCommands::Edit(args) => edit(args, ctx),
        PageCommands::Rename { page, title } => rename(page, title, ctx),
        PageCommands::Move {
            page,
            parent,
            root,
            sequence,
        } => move_page(page, parent.as_deref(), *root, *sequence, ctx),
        PageCommands::Delete { page, force } => delete(page, *force, ctx),
        PageCommands::Links { page } => links(page, ctx),
    }
}

fn create(args: &PageCreateArgs, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;

    let parent_id = match &args.parent {
        Some(parent) => Some(resolve_page(engine.storage(), parent)?.id),
        None => None,
    };
    let content = if args.content.is_some() || args.file.is_some() {
        read_content(args.content.as_deref(), args.file.as_deref())?
    } else {
        String::new()
    };

    let new = NewPage {
        title: args.title.clone(),
        parent_id,
        sequence: args.sequence,
        content_md: content,
        file_path: None,
    };
    let page = engine.create_page(&new)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&page)?);
    } else {
        println!("Created page {}: {}", page.id, page.title);
        println!("  File: {}", page.file_path);
        if page.title != args.title {
            println!(
                "  {}",
                format!("Title '{}' was taken; renamed.", args.title).dimmed()
            );
        }
    }
    Ok(())
}

fn show(reference: &str, html: bool, history: bool, ctx: &Context<'_>) -> Result<()> {
    let storage = open_storage(ctx.db_path)?;
    let page = resolve_page(&storage, reference)?;
    let breadcrumbs = storage.breadcrumbs(page.id)?;
    let events = if history {
        storage.page_events(page.id, Some(50))?
    } else {
        Vec::new()
    };

    if ctx.json {
        let history: Vec<_> = events
            .iter()
            .map(|e| {
                serde_json::json!({
                    "event": e.event_type.as_str(),
                    "actor": e.actor,
                    "old_value": e.old_value,
                    "new_value": e.new_value,
                    "created_at": e.created_at,
                })
            })
            .collect();
        let output = serde_json::json!({
            "page": page,
            "breadcrumbs": breadcrumbs,
            "history": history,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if !breadcrumbs.is_empty() {
        let trail: Vec<&str> = breadcrumbs.iter().map(|b| b.title.as_str()).collect();
        println!("{}", trail.join(" / ").dimmed());
    }
    println!("{} {}", page.title.bold(), format!("#{}", page.id).dimmed());
    println!("{}", page.file_path.dimmed());
    println!(
        "{}",
        format!(
            "by {} · {} edits · updated {}",
            page.created_by,
            page.edit_count,
            format_timestamp(page.updated_at)
        )
        .dimmed()
    );
    println!();
    if html {
        println!("{}", page.body_html);
    } else {
        println!("{}", page.content_md);
    }

    if history {
        println!();
        println!("{}", "History".cyan().bold());
        for event in &events {
            println!(
                "  {} {} {}",
                format_timestamp(event.created_at).dimmed(),
                event.event_type.as_str(),
                event.actor.dimmed()
            );
        }
    }
    Ok(())
}

fn list(parent: Option<&str>, limit: usize, ctx: &Context<'_>) -> Result<()> {
    let storage = open_storage(ctx.db_path)?;

    let pages = match parent {
        Some(reference) => {
            let parent = resolve_page(&storage, reference)?;
            storage.list_children(parent.id)?
        }
        None => storage.list_pages()?,
    };
    let pages: Vec<Page> = pages.into_iter().take(limit).collect();

    if ctx.json {
        let output = PageListOutput {
            count: pages.len(),
            pages: pages.iter().map(PageSummary::from).collect(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if pages.is_empty() {
        println!("No pages found.");
        return Ok(());
    }

    println!("Pages ({} found):", pages.len());
    println!();
    for page in &pages {
        println!(
            "  {:>5}  {}  {}",
            page.id.to_string().dimmed(),
            page.title,
            page.file_path.dimmed()
        );
    }
    Ok(())
}

fn tree(ctx: &Context<'_>) -> Result<()> {
    let storage = open_storage(ctx.db_path)?;
    let nodes = storage.nav_tree()?;

    if ctx.json {
        println!("{}", serde_json::to_string(&nodes)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("No pages found.");
        return Ok(());
    }
    for node in &nodes {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &PageNode, depth: usize) {
    println!(
        "{}{} {}",
        "  ".repeat(depth),
        node.title,
        format!("#{}", node.id).dimmed()
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn edit(args: &PageEditArgs, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), &args.page)?;
    let input = read_content(args.content.as_deref(), args.file.as_deref())?;

    let changed = if args.html {
        engine.edit_html(page.id, &input)?
    } else {
        engine.edit_markdown(page.id, &input)?
    };

    if ctx.json {
        let output = serde_json::json!({
            "id": page.id,
            "changed": changed,
            "file_path": page.file_path,
        });
        println!("{output}");
    } else if changed {
        println!("Updated page {}: {}", page.id, page.title);
    } else {
        println!("No changes to page {}.", page.id);
    }
    Ok(())
}

fn rename(reference: &str, title: &str, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), reference)?;
    let changes = engine.rename_page(page.id, title)?;
    report_path_changes(&engine, page.id, &changes, "Renamed", ctx.json)
}

fn move_page(
    reference: &str,
    parent: Option<&str>,
    root: bool,
    sequence: Option<i64>,
    ctx: &Context<'_>,
) -> Result<()> {
    if parent.is_none() && !root && sequence.is_none() {
        return Err(Error::InvalidArgument(
            "Nothing to do: pass --parent, --root or --sequence".to_string(),
        ));
    }

    let mut engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), reference)?;

    let changes = if root {
        engine.move_page(page.id, None)?
    } else if let Some(parent) = parent {
        let parent = resolve_page(engine.storage(), parent)?;
        engine.move_page(page.id, Some(parent.id))?
    } else {
        Vec::new()
    };

    if let Some(sequence) = sequence {
        let actor = engine.actor().to_string();
        engine.storage_mut().set_sequence(page.id, sequence, &actor)?;
    }

    report_path_changes(&engine, page.id, &changes, "Moved", ctx.json)
}

fn report_path_changes(
    engine: &SyncEngine,
    id: i64,
    changes: &[PathChange],
    verb: &str,
    json: bool,
) -> Result<()> {
    let page = engine
        .storage()
        .get_page(id)?
        .ok_or_else(|| Error::PageNotFound { id: id.to_string() })?;

    if json {
        let output = PathChangeOutput {
            id: page.id,
            title: &page.title,
            file_path: &page.file_path,
            moved: changes,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{verb} page {}: {}", page.id, page.title);
    for change in changes {
        println!("  {} -> {}", change.old_path.dimmed(), change.new_path);
    }
    Ok(())
}

fn delete(reference: &str, force: bool, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), reference)?;

    let children = engine.storage().list_children(page.id)?;
    if !children.is_empty() && !force {
        return Err(Error::InvalidArgument(format!(
            "Page '{}' has {} child page(s); pass --force to delete them too",
            page.title,
            children.len()
        )));
    }

    let removed = engine.delete_page(page.id)?;

    if ctx.json {
        let ids: Vec<i64> = removed.iter().map(|p| p.id).collect();
        let output = serde_json::json!({
            "deleted": ids,
            "count": ids.len(),
        });
        println!("{output}");
    } else {
        println!("Deleted {} page(s):", removed.len());
        for page in &removed {
            println!("  {} {}", page.title, page.file_path.dimmed());
        }
    }
    Ok(())
}

fn links(reference: &str, ctx: &Context<'_>) -> Result<()> {
    let storage = open_storage(ctx.db_path)?;
    let page = resolve_page(&storage, reference)?;
    let outgoing = storage.linked_pages(page.id)?;
    let incoming = storage.backlinks(page.id)?;

    if ctx.json {
        let output = serde_json::json!({
            "id": page.id,
            "links": outgoing.iter().map(PageSummary::from).collect::<Vec<_>>(),
            "backlinks": incoming.iter().map(PageSummary::from).collect::<Vec<_>>(),
        });
        println!("{output}");
        return Ok(());
    }

    println!("{}", page.title.bold());
    println!();
    println!("{}", "Links to".cyan().bold());
    print_link_list(&outgoing);
    println!("{}", "Linked from".cyan().bold());
    print_link_list(&incoming);
    Ok(())
}

fn print_link_list(pages: &[Page]) {
    if pages.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for page in pages {
        println!("  {} {}", format!("#{}", page.id).dimmed(), page.title);
    }
}
