//! Operator CLI for gridclaim canvas databases.
//!
//! # Responsibility
//! - Verify `gridclaim_core` linkage (`version`).
//! - Export and restore whole-canvas snapshots against a database file.
//! - Print a leaderboard without starting the server.

use clap::{Parser, Subcommand};
use gridclaim_core::{now_ms, CanvasConfig, CanvasService, PeriodKind};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Operator tools for a gridclaim canvas database.
#[derive(Debug, Parser)]
#[command(name = "gridclaim_cli")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Print the linked core version (default).
    Version,
    /// Write the whole canvas to a JSON snapshot file.
    ExportSnapshot {
        /// Canvas database file.
        db: PathBuf,
        /// Snapshot file to write.
        out: PathBuf,
    },
    /// Replace the canvas with a JSON snapshot file.
    RestoreSnapshot {
        /// Canvas database file.
        db: PathBuf,
        /// Snapshot file to read.
        input: PathBuf,
    },
    /// Print the current leaderboard of a period.
    Leaderboard {
        /// Canvas database file.
        db: PathBuf,
        /// `day`, `week`, `month` or `all_time`.
        #[arg(default_value = "day", value_parser = parse_period)]
        period: PeriodKind,
        /// Maximum number of groups to print.
        limit: Option<u32>,
    },
}

fn parse_period(value: &str) -> Result<PeriodKind, String> {
    PeriodKind::parse(value).ok_or_else(|| format!("unknown period `{value}`"))
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Version => {
            println!("gridclaim_core ping={}", gridclaim_core::ping());
            println!("gridclaim_core version={}", gridclaim_core::core_version());
        }
        Command::ExportSnapshot { db, out } => {
            let service = CanvasService::open(&db, CanvasConfig::default())?;
            let snapshot = service.export_snapshot(&out, now_ms())?;
            println!(
                "exported snapshot_id={} commit_seq={} cells={} to {}",
                snapshot.snapshot_id,
                snapshot.commit_seq,
                snapshot.cells.len(),
                out.display()
            );
        }
        Command::RestoreSnapshot { db, input } => {
            let service = CanvasService::open(&db, CanvasConfig::default())?;
            let snapshot = service.import_snapshot(&input)?;
            println!(
                "restored snapshot_id={} commit_seq={} cells={} into {}",
                snapshot.snapshot_id,
                snapshot.commit_seq,
                snapshot.cells.len(),
                db.display()
            );
        }
        Command::Leaderboard { db, period, limit } => {
            let service = CanvasService::open(&db, CanvasConfig::default())?;
            let board = service.leaderboard(period, now_ms(), limit)?;
            println!("{} {}", board.period_kind, board.period_id);
            for entry in &board.entries {
                println!("{:>3}. {:<8} {}", entry.rank, entry.group_id.as_str(), entry.count);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Command::Version)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gridclaim_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use gridclaim_core::PeriodKind;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<Option<Command>, clap::Error> {
        Cli::try_parse_from(std::iter::once("gridclaim_cli").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn no_arguments_prints_version() {
        assert_eq!(parse(&[]).unwrap(), None);
        assert_eq!(parse(&["version"]).unwrap(), Some(Command::Version));
    }

    #[test]
    fn snapshot_commands_take_two_paths() {
        assert_eq!(
            parse(&["export-snapshot", "canvas.db", "out.json"]).unwrap(),
            Some(Command::ExportSnapshot {
                db: PathBuf::from("canvas.db"),
                out: PathBuf::from("out.json"),
            })
        );
        assert!(parse(&["restore-snapshot", "canvas.db"]).is_err());
    }

    #[test]
    fn leaderboard_defaults_to_day() {
        assert_eq!(
            parse(&["leaderboard", "canvas.db"]).unwrap(),
            Some(Command::Leaderboard {
                db: PathBuf::from("canvas.db"),
                period: PeriodKind::Day,
                limit: None,
            })
        );
        assert_eq!(
            parse(&["leaderboard", "canvas.db", "week", "10"]).unwrap(),
            Some(Command::Leaderboard {
                db: PathBuf::from("canvas.db"),
                period: PeriodKind::Week,
                limit: Some(10),
            })
        );
        assert!(parse(&["leaderboard", "canvas.db", "decade"]).is_err());
        assert!(parse(&["leaderboard", "canvas.db", "week", "many"]).is_err());
    }
}
