use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use rankwatch::cli::{Cli, Command, DatesArgs, DetectArgs, ImportArgs, LedgerArgs, ShowArgs};
use rankwatch::config::Config;
use rankwatch::detect::{self, DetectOptions};
use rankwatch::report;
use rankwatch::store::ledger::Ledger;
use rankwatch::store::result::ResultStore;
use rankwatch::store::snapshot::SnapshotStore;
use rankwatch::store::RankedApp;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_LEDGER_NOT_SAVED: u8 = 3;

type CommandResult = Result<ExitCode, Box<dyn std::error::Error>>;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_detect(config: &Config, args: &DetectArgs) -> CommandResult {
    // the only wall clock read of a run
    let now = chrono::Local::now().naive_local();
    let options = DetectOptions {
        date: args.date.unwrap_or(now.date()),
        force: args.force,
    };

    let summary = detect::run(config, &options, now)?;
    report::print_run(&summary, args.json, config.verbose);

    if let Some(e) = &summary.ledger_error {
        eprintln!("warning: result saved but the suppression ledger was not updated: {e}");
        return Ok(ExitCode::from(EXIT_LEDGER_NOT_SAVED));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(config: &Config, args: &ShowArgs) -> CommandResult {
    let store = ResultStore::new(&config.data_dir);

    let date = match args.date {
        Some(date) => date,
        None => match store.list_dates()?.first() {
            Some(date) => *date,
            None => {
                eprintln!("No detection results found. Run 'rankwatch detect' to create one.");
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        },
    };

    match store.load(date)? {
        Some(result) => {
            report::print(&result, args.json);
            if !args.json {
                println!("generated at {}", result.generated_at);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No detection result for {date}.");
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}

fn run_dates(config: &Config, args: &DatesArgs) -> CommandResult {
    let (dates, what) = if args.results {
        (ResultStore::new(&config.data_dir).list_dates()?, "detection results")
    } else {
        (SnapshotStore::new(&config.data_dir).list_dates()?, "ranking snapshots")
    };

    if dates.is_empty() {
        println!("No {what} found in {}.", config.data_dir.display());
    } else {
        for date in dates {
            println!("{date}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_ledger(config: &Config, args: &LedgerArgs) -> CommandResult {
    let ledger = Ledger::load(&Ledger::path(&config.data_dir))?;

    if args.json {
        let value = serde_json::json!({
            "analyzed_apps": ledger.ids().collect::<Vec<_>>(),
            "last_updated": ledger.last_updated(),
            "total_count": ledger.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("analyzed apps: {}", ledger.len());
        println!("last updated:  {}", ledger.last_updated().unwrap_or("never"));
    }
    Ok(ExitCode::SUCCESS)
}

fn read_apps(path: &Path) -> Result<Vec<RankedApp>, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let apps = serde_json::from_str(&raw).map_err(|e| format!("invalid app list in {}: {e}", path.display()))?;
    Ok(apps)
}

fn run_import(config: &Config, args: &ImportArgs) -> CommandResult {
    let category = args.category.trim().to_lowercase();
    if category.is_empty() {
        return Err("category must not be empty".into());
    }

    let apps = read_apps(&args.file)?;
    let path = SnapshotStore::new(&config.data_dir).save(args.date, args.platform, &category, &apps)?;

    tracing::info!("stored {} app(s) for {} / {category} on {}", apps.len(), args.platform, args.date);
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let config = match Config::from_global_args(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    tracing::debug!(data_dir = %config.data_dir.display(), "config loaded");

    let outcome = match &cli.command {
        Command::Detect(args) => run_detect(&config, args),
        Command::Show(args) => run_show(&config, args),
        Command::Dates(args) => run_dates(&config, args),
        Command::Ledger(args) => run_ledger(&config, args),
        Command::Import(args) => run_import(&config, args),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
