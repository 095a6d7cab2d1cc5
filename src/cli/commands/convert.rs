//! Standalone Markdown ⇄ HTML conversion.
//!
//! Reads stdin, writes stdout. No database is opened, so path links cannot
//! be resolved; `doc://` links are still rewritten.

use crate::cli::commands::read_stdin;
use crate::cli::ConvertCommands;
use crate::error::Result;
use crate::sync::convert::NoPaths;
use crate::sync::{html_to_markdown, markdown_to_html};
use tracing::warn;

/// Execute convert commands.
///
/// # Errors
///
/// Returns an error if stdin cannot be read.
pub fn execute(command: &ConvertCommands, json: bool) -> Result<()> {
    let input = read_stdin()?;

    let conversion = match command {
        ConvertCommands::MdToHtml => markdown_to_html(&input, None, &NoPaths),
        ConvertCommands::HtmlToMd => html_to_markdown(&input, ""),
    };
    if let Some(warning) = &conversion.warning {
        warn!(%warning, "Conversion degraded");
    }

    if json {
        let output = serde_json::json!({
            "content": conversion.content,
            "warning": conversion.warning,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", conversion.content);
    }
    Ok(())
}
