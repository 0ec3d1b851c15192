//! Command-line interface definitions for the `matchday` binary

use clap::{Parser, Subcommand};
use matchday_common::{MatchdayError, ScopeKey};
use std::path::PathBuf;

use crate::orchestrator::DEFAULT_TRIGGER;

/// Exit status when the run completed, including partial failure
pub const EXIT_COMPLETED: i32 = 0;

/// Exit status when another invocation holds the pipeline lock
pub const EXIT_LOCK_HELD: i32 = 1;

/// Exit status for configuration and startup failures
pub const EXIT_STARTUP_ERROR: i32 = 2;

/// Matchday - football fixtures pipeline
#[derive(Parser, Debug)]
#[command(name = "matchday")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest, transform, load and publish every configured league and season
    Run {
        /// Source tag recorded on run history
        #[arg(long, default_value = DEFAULT_TRIGGER)]
        source: String,
    },

    /// Reload Postgres from stored artifacts without calling the API
    Rebuild {
        #[arg(long, default_value = DEFAULT_TRIGGER)]
        source: String,
    },

    /// Fetch one league/season and store the raw response
    Ingest {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Transform a stored raw response into CSV and Parquet files
    Transform {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Export directory (defaults to MATCHDAY_DATA_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Write only the CSV file
        #[arg(long)]
        no_parquet: bool,
    },

    /// Show the lock state and recent run history
    Status {
        #[arg(long)]
        league: Option<i32>,

        #[arg(long)]
        season: Option<i32>,

        /// Number of history entries
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
}

/// One league/season, given either as `--scope 39:2025` or as
/// `--league 39 --season 2025`
#[derive(clap::Args, Debug, Clone, Copy)]
#[group(required = true, multiple = true)]
pub struct ScopeArgs {
    /// League and season as LEAGUE:SEASON
    #[arg(long, value_name = "LEAGUE:SEASON", conflicts_with_all = ["league", "season"])]
    pub scope: Option<ScopeKey>,

    /// API-Football league id, e.g. 39 for the Premier League
    #[arg(long, requires = "season")]
    pub league: Option<i32>,

    /// Season start year, e.g. 2025
    #[arg(long, requires = "league")]
    pub season: Option<i32>,
}

impl TryFrom<ScopeArgs> for ScopeKey {
    type Error = MatchdayError;

    fn try_from(args: ScopeArgs) -> Result<Self, Self::Error> {
        match args {
            ScopeArgs {
                scope: Some(scope), ..
            } => Ok(scope),
            ScopeArgs {
                league: Some(league),
                season: Some(season),
                ..
            } => Ok(ScopeKey::new(league, season)),
            _ => Err(MatchdayError::InvalidScope(
                "pass --scope LEAGUE:SEASON or both --league and --season".to_string(),
            )),
        }
    }
}
