use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::platform::Platform;
use crate::store::snapshot::DATE_FORMAT;

#[derive(Parser)]
#[command(name = "rankwatch")]
#[command(about = "Detects apps newly entering app store category rankings")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding raw/, new_apps/ and the ledger
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Show debug logging and per-category outcomes
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Find apps that entered the rankings on a date
    Detect(DetectArgs),

    /// Display a stored detection result
    Show(ShowArgs),

    /// List dates with ranking snapshots or detection results
    Dates(DatesArgs),

    /// Show the record of already analyzed apps
    Ledger(LedgerArgs),

    /// Store a JSON list of ranked apps as a snapshot
    Import(ImportArgs),
}

/// Parses YYYY-MM-DD for --date flags
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

#[derive(Parser)]
pub struct DetectArgs {
    /// Target date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Re-surface already analyzed apps and leave the ledger untouched
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Result date (defaults to the most recent result)
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DatesArgs {
    /// List detection result dates instead of snapshot dates
    #[arg(long, default_value_t = false)]
    pub results: bool,
}

#[derive(Parser)]
pub struct LedgerArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Snapshot date
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,

    /// app_store or google_play
    #[arg(long)]
    pub platform: Platform,

    /// Category key, e.g. health_fitness
    #[arg(long)]
    pub category: String,

    /// JSON file containing an array of apps
    pub file: PathBuf,
}
