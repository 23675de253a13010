//! Administrative CLI: runs the idempotent repair passes against a
//! clinic database and prints their summaries.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dentsync::config;
use dentsync::db::repository::prune_linkage_audit;
use dentsync::db::{open_database, DatabaseError};
use dentsync::engine::backfill::{run_backfill, run_color_integrity, run_event_replay};

#[derive(Parser)]
#[command(name = "dentsync", version, about = "Tooth-state reconciliation maintenance")]
struct Cli {
    /// Path to the clinic database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the event-replay and color-integrity passes
    Backfill,
    /// Replay completed treatments and appointments only
    Replay,
    /// Repair diagnosis rows whose color disagrees with their status
    ColorFix,
    /// Delete linkage audit entries older than the retention window
    PruneAudit {
        #[arg(long, default_value_t = 365)]
        retention_days: i64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::debug!(version = config::APP_VERSION, "{} starting", config::APP_NAME);

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), DatabaseError> {
    let db_path = cli.db.unwrap_or_else(config::default_db_path);
    tracing::info!(path = %db_path.display(), "Opening clinic database");
    let conn = open_database(&db_path)?;

    match cli.command {
        Command::Backfill => {
            let report = run_backfill(&conn, None)?;
            print_json(&report);
        }
        Command::Replay => {
            let summary = run_event_replay(&conn, None)?;
            print_json(&summary);
        }
        Command::ColorFix => {
            let summary = run_color_integrity(&conn, None)?;
            print_json(&summary);
        }
        Command::PruneAudit { retention_days } => {
            let deleted = prune_linkage_audit(&conn, retention_days)?;
            println!("{{\"deleted\":{deleted}}}");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to serialize report: {e}"),
    }
}
