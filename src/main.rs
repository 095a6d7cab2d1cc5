//! docsync CLI entry point.

use clap::Parser;
use docsync::cli::commands::{self, Context};
use docsync::cli::{Cli, Commands, OutputFormat};
use docsync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR --format json OR non-TTY stdout
    let json = cli.json
        || cli.format == OutputFormat::Json
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    // Run the command and handle errors
    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let ctx = Context {
        db_path: cli.db.as_ref(),
        repo: cli.repo.as_ref(),
        actor: cli.actor.as_deref(),
        json,
    };

    match &cli.command {
        Commands::Init { remote, force } => commands::init::execute(
            cli.db.as_ref(),
            cli.repo.as_ref(),
            remote.as_deref(),
            &ctx.actor(),
            *force,
            json,
        ),
        Commands::Version => commands::version::execute(json),

        // Pages
        Commands::Page { command } => commands::page::execute(command, &ctx),

        // Store <-> disk
        Commands::Sync { command } => commands::sync::execute(command, &ctx),

        // Repository
        Commands::Git { command } => commands::git::execute(command, &ctx),
        Commands::Watch { interval } => commands::watch::execute(*interval, &ctx),

        // Conversion (no database)
        Commands::Convert { command } => commands::convert::execute(command, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
