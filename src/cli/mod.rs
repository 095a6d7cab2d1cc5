//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
}

pub mod commands;

/// docsync - keep documentation pages and a git Markdown mirror in step
#[derive(Parser, Debug)]
#[command(name = "docsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.docsync/data/docsync.db)
    #[arg(long, global = true, env = "DOCSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Repository root the pages are mirrored into
    #[arg(long, global = true, env = "DOCSYNC_REPO")]
    pub repo: Option<PathBuf>,

    /// Actor name for audit trail and commit author
    #[arg(long, global = true, env = "DOCSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and record the repository location
    Init {
        /// Remote URL used to create `origin` on first push
        #[arg(long, env = "DOCSYNC_REMOTE")]
        remote: Option<String>,

        /// Re-record settings on an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Page management
    Page {
        #[command(subcommand)]
        command: PageCommands,
    },

    /// Mirror pages to and from the Markdown tree
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Commit, push and pull the repository
    Git {
        #[command(subcommand)]
        command: GitCommands,
    },

    /// Convert between Markdown and HTML (stdin to stdout)
    Convert {
        #[command(subcommand)]
        command: ConvertCommands,
    },

    /// Run auto-sync periodically until interrupted
    Watch {
        /// Seconds between sync rounds
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Page Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PageCommands {
    /// Create a page
    Create(PageCreateArgs),

    /// Show a page
    Show {
        /// Page ID, title or file path
        page: String,

        /// Print the rendered HTML instead of Markdown
        #[arg(long)]
        html: bool,

        /// Include the audit history
        #[arg(long)]
        history: bool,
    },

    /// List pages
    List {
        /// Only children of this page
        #[arg(short, long)]
        parent: Option<String>,

        /// Maximum pages to return
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show the page hierarchy
    Tree,

    /// Replace a page's content
    Edit(PageEditArgs),

    /// Rename a page (moves its files and its descendants' files)
    Rename {
        /// Page ID, title or file path
        page: String,

        /// New title
        title: String,
    },

    /// Move a page under another page, to the root, or among siblings
    Move {
        /// Page ID, title or file path
        page: String,

        /// New parent page
        #[arg(short, long, conflicts_with = "root")]
        parent: Option<String>,

        /// Make the page a root page
        #[arg(long)]
        root: bool,

        /// Position among siblings
        #[arg(short, long)]
        sequence: Option<i64>,
    },

    /// Delete a page and its descendants
    Delete {
        /// Page ID, title or file path
        page: String,

        /// Required when the page has descendants
        #[arg(short, long)]
        force: bool,
    },

    /// Show links from and to a page
    Links {
        /// Page ID, title or file path
        page: String,
    },
}

#[derive(Args, Debug)]
pub struct PageCreateArgs {
    /// Page title
    pub title: String,

    /// Parent page (ID, title or file path)
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Markdown content
    #[arg(short, long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read Markdown content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Position among siblings
    #[arg(short, long)]
    pub sequence: Option<i64>,
}

#[derive(Args, Debug)]
pub struct PageEditArgs {
    /// Page ID, title or file path
    pub page: String,

    /// New content (reads stdin when neither --content nor --file is given)
    #[arg(short, long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read new content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Treat the input as HTML and convert it to Markdown
    #[arg(long)]
    pub html: bool,
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Merge the Markdown tree on disk into the page store
    Reconcile,

    /// Write every page to disk
    WriteAll,

    /// Write one page to disk
    Write {
        /// Page ID, title or file path
        page: String,
    },

    /// Read one page's file from disk
    Read {
        /// Page ID, title or file path
        page: String,

        /// Store the file's body as the page content
        #[arg(long)]
        import: bool,
    },

    /// Compare the page store with the Markdown tree
    Status,
}

// ============================================================================
// Git Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum GitCommands {
    /// Stage and commit all changes in the repository
    Commit {
        /// Commit message
        #[arg(short, long, default_value = "Update from docsync")]
        message: String,

        /// Push after committing
        #[arg(long)]
        push: bool,
    },

    /// Push to origin (creates origin from the configured remote if missing)
    Push,

    /// Pull with rebase, then reconcile
    Pull,

    /// Commit and push, then pull and reconcile
    Auto,
}

// ============================================================================
// Convert Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConvertCommands {
    /// Markdown on stdin to an HTML fragment on stdout
    MdToHtml,

    /// HTML on stdin to Markdown on stdout
    HtmlToMd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_to_root() {
        let cli = Cli::try_parse_from(["docsync", "page", "move", "12", "--root"]).unwrap();
        match cli.command {
            Commands::Page {
                command: PageCommands::Move { page, root, parent, .. },
            } => {
                assert_eq!(page, "12");
                assert!(root);
                assert!(parent.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parent_conflicts_with_root() {
        let result =
            Cli::try_parse_from(["docsync", "page", "move", "12", "--root", "--parent", "3"]);
        assert!(result.is_err());
    }
}
