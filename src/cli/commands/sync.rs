//! Sync command implementations.
//!
//! These commands move content between the page store and the Markdown
//! tree without touching git: `write-all`/`write` push store → disk,
//! `reconcile`/`read --import` pull disk → store.

use crate::cli::commands::{open_engine, resolve_page, Context};
use crate::cli::SyncCommands;
use crate::error::Result;
use crate::sync::{print_status, ReadOutcome, ReconcileStats};

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the repository is missing, another sync holds the
/// lock, or the store fails.
pub fn execute(command: &SyncCommands, ctx: &Context<'_>) -> Result<()> {
    match command {
        SyncCommands::Reconcile => reconcile(ctx),
        SyncCommands::WriteAll => write_all(ctx),
        SyncCommands::Write { page } => write(page, ctx),
        SyncCommands::Read { page, import } => read(page, *import, ctx),
        SyncCommands::Status => status(ctx),
    }
}

fn reconcile(ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let stats = engine.reconcile()?;

    if ctx.json {
        let output = serde_json::json!({
            "success": true,
            "repository": engine.config().repo_root.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if stats.is_empty() && stats.skipped == 0 {
        println!("Already in sync: {}", engine.config().repo_root.display());
    } else {
        println!("Reconciled {}", engine.config().repo_root.display());
        println!();
        print_reconcile_stats(&stats);
    }
    Ok(())
}

/// Print non-zero reconciliation counts, one per line.
pub fn print_reconcile_stats(stats: &ReconcileStats) {
    let rows = [
        ("Created", stats.created),
        ("Updated", stats.updated),
        ("Relinked", stats.relinked),
        ("Pruned", stats.pruned),
        ("Skipped", stats.skipped),
    ];
    for (label, count) in rows {
        if count > 0 {
            println!("  {:<10}{count}", format!("{label}:"));
        }
    }
}

fn write_all(ctx: &Context<'_>) -> Result<()> {
    let engine = open_engine(ctx)?;
    let stats = engine.write_all()?;

    if ctx.json {
        let output = serde_json::json!({
            "success": stats.failed == 0,
            "repository": engine.config().repo_root.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Wrote {} page file(s) to {}",
            stats.written,
            engine.config().repo_root.display()
        );
        if stats.failed > 0 {
            println!("  {} failed (run with -v for details)", stats.failed);
        }
    }
    Ok(())
}

fn write(reference: &str, ctx: &Context<'_>) -> Result<()> {
    let engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), reference)?;
    let path = engine.write_page(page.id)?;

    if ctx.json {
        let output = serde_json::json!({
            "id": page.id,
            "path": path.display().to_string(),
        });
        println!("{output}");
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn read(reference: &str, import: bool, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let page = resolve_page(engine.storage(), reference)?;
    let outcome = engine.read_page(page.id)?;
    let imported = if import {
        engine.import_page(page.id)?
    } else {
        false
    };

    match outcome {
        ReadOutcome::Found { metadata, body } => {
            if ctx.json {
                let output = serde_json::json!({
                    "id": page.id,
                    "found": true,
                    "metadata": metadata,
                    "body": body,
                    "imported": imported,
                });
                println!("{}", serde_json::to_string(&output)?);
            } else if import {
                if imported {
                    println!("Imported {} into page {}.", page.file_path, page.id);
                } else {
                    println!("Page {} already matches {}.", page.id, page.file_path);
                }
            } else {
                println!("{body}");
            }
        }
        ReadOutcome::NotFound => {
            if ctx.json {
                let output = serde_json::json!({
                    "id": page.id,
                    "found": false,
                    "imported": false,
                });
                println!("{output}");
            } else {
                println!("No file for page {} at {}.", page.id, page.file_path);
            }
        }
    }
    Ok(())
}

fn status(ctx: &Context<'_>) -> Result<()> {
    let engine = open_engine(ctx)?;
    let status = engine.status()?;

    if ctx.json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
