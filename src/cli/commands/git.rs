//! Git command implementations.

use crate::cli::commands::sync::print_reconcile_stats;
use crate::cli::commands::{open_engine, Context};
use crate::cli::GitCommands;
use crate::error::Result;
use crate::git::RepositoryGateway;
use colored::Colorize;

/// Execute git commands.
///
/// # Errors
///
/// Returns a gateway error (missing repository, timeout, git failure) or a
/// reconciliation error after a pull.
pub fn execute(command: &GitCommands, ctx: &Context<'_>) -> Result<()> {
    let mut engine = open_engine(ctx)?;
    let gateway = engine.config().gateway();

    match command {
        GitCommands::Commit { message, push } => {
            let summary = if *push {
                engine.commit_and_push(&gateway, message)?
            } else {
                engine.commit(&gateway, message)?
            };
            print_summary("commit", &summary, ctx.json)
        }
        GitCommands::Push => {
            let summary = gateway.push()?;
            print_summary("push", &summary, ctx.json)
        }
        GitCommands::Pull => {
            let (pulled, stats) = engine.pull_and_reconcile(&gateway)?;
            if ctx.json {
                let output = serde_json::json!({
                    "pull": pulled,
                    "reconcile": stats,
                });
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("{pulled}");
                print_reconcile_stats(&stats);
            }
            Ok(())
        }
        GitCommands::Auto => {
            let report = engine.auto_sync(&gateway)?;
            if ctx.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                if let Some(push) = &report.push {
                    println!("{push}");
                }
                if let Some(error) = &report.push_error {
                    println!("{} {error}", "Push failed:".yellow());
                }
                println!("{}", report.pull);
                print_reconcile_stats(&report.reconcile);
            }
            Ok(())
        }
    }
}

fn print_summary(action: &str, summary: &str, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "action": action,
            "summary": summary,
        });
        println!("{output}");
    } else {
        println!("{summary}");
    }
    Ok(())
}
