//! Periodic auto-sync.
//!
//! Runs one `auto_sync` round immediately, then one per interval, until
//! Ctrl-C. Each round runs on the blocking pool since git and SQLite are
//! synchronous; a failed round is logged and the loop continues.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::cli::commands::{open_engine, Context};
use crate::error::{Error, Result};
use crate::sync::{AutoSyncReport, SyncEngine};

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if the engine cannot be opened, the interval is zero,
/// or the runtime cannot start.
pub fn execute(interval_secs: u64, ctx: &Context<'_>) -> Result<()> {
    if interval_secs == 0 {
        return Err(Error::InvalidArgument(
            "--interval must be at least 1 second".to_string(),
        ));
    }

    let engine = open_engine(ctx)?;
    let json = ctx.json;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(engine, Duration::from_secs(interval_secs), json))
}

async fn run(mut engine: SyncEngine, period: Duration, json: bool) -> Result<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        repo = %engine.config().repo_root.display(),
        interval_secs = period.as_secs(),
        "Watching"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (returned, outcome) = tokio::task::spawn_blocking(move || {
                    let gateway = engine.config().gateway();
                    let outcome = engine.auto_sync(&gateway);
                    (engine, outcome)
                })
                .await
                .map_err(|e| Error::Other(format!("sync round panicked: {e}")))?;
                engine = returned;

                match outcome {
                    Ok(report) => print_round(&report, json)?,
                    Err(e) => error!(error = %e, "Auto-sync round failed"),
                }
            }
            _ = &mut shutdown => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn print_round(report: &AutoSyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        let push = report
            .push
            .as_deref()
            .or(report.push_error.as_deref())
            .unwrap_or_default();
        println!(
            "[{stamp}] {push} | {} | {} change(s)",
            report.pull,
            report.reconcile.total_changes()
        );
    }
    Ok(())
}
