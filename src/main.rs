mod config;
mod dashboard;
mod error;
mod loader;
mod merge;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::scraper::cleaner::normalise_code;
use crate::storage::Repository;

#[derive(Parser)]
#[command(
    name = "shareholder-tracker",
    about = "Taiwan stock shareholder-distribution scraper and dashboard",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape one stock code, save today's snapshot and update its master table
    Run {
        /// Stock code, e.g. 2330
        code: String,
    },

    /// Merge an existing snapshot file into a code's master table
    Merge {
        /// Snapshot CSV (e.g. log_file/2330_20250213.csv)
        snapshot: PathBuf,
        code: String,
    },

    /// List stock codes that have a master table
    List,

    /// Serve the chart dashboard
    Dashboard {
        #[arg(long, env = "TWSTHR_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "TWSTHR_PORT")]
        port: Option<u16>,

        /// Do not open a browser tab on startup
        #[arg(long)]
        no_browser: bool,
    },
}

fn init_logging(verbose: u8, config: &AppConfig) -> Result<()> {
    let filter = match verbose {
        0 => "shareholder_tracker=info,warn",
        1 => "shareholder_tracker=debug,info",
        _ => "trace",
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.file)
        .with_context(|| format!("Could not open log file {:?}", config.logging.file))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                // plain text when captured by the dashboard
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(EnvFilter::new(filter))
        .init();
    Ok(())
}

/// `--help`/`--version` exit 0; any usage error exits 1 rather than clap's 2.
fn parse_exit_code(e: &clap::Error) -> u8 {
    if e.use_stderr() { 1 } else { 0 }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return Ok(ExitCode::from(parse_exit_code(&e)));
        }
    };

    let config = AppConfig::load()?;
    init_logging(cli.verbose, &config)?;

    match cli.command {
        Command::Run { code } => {
            let code = normalise_code(&code);
            let _t = utils::Timer::start(format!("Scrape {}", code));

            match Pipeline::new(config)?.run(&code).await? {
                RunOutcome::Updated(stats) => {
                    info!(
                        "Done: {} rows scraped into {:?}, {} new keys and {} duplicates in {:?}",
                        stats.snapshot_rows,
                        stats.snapshot_path,
                        stats.merge.added,
                        stats.merge.duplicates,
                        stats.master_path
                    );
                }
                RunOutcome::NoData => {
                    warn!("{}: no data extracted", code);
                    println!("No data extracted for {}, check that the stock code is correct", code);
                    return Ok(ExitCode::from(1));
                }
            }
        }

        Command::Merge { snapshot, code } => {
            let code = normalise_code(&code);
            let _t = utils::Timer::start(format!("Merge {}", code));
            let repo = Repository::open(&config.storage);
            let (master_path, report) = repo
                .update_master(&code, &snapshot, config.merge.duplicate_policy)
                .with_context(|| format!("Could not update master for {}", code))?;
            println!(
                "Updated master file {} ({} new keys, {} duplicates)",
                master_path.display(),
                report.added,
                report.duplicates
            );
        }

        Command::List => {
            let repo = Repository::open(&config.storage);
            let codes = repo.list_codes()?;
            if codes.is_empty() {
                println!("No master tables — run `shareholder-tracker run <code>` first.");
            } else {
                println!("{} stocks:", codes.len());
                for code in &codes {
                    match repo.master_info(code) {
                        Ok(info) => println!(
                            "  {:<8} {:>8} rows  latest {}",
                            info.code,
                            utils::fmt_number(info.rows),
                            info.latest.as_deref().unwrap_or("—")
                        ),
                        Err(e) => println!("  {:<8} unreadable: {}", code, e),
                    }
                }
            }
        }

        Command::Dashboard { host, port, no_browser } => {
            let mut config = config;
            if let Some(host) = host {
                config.dashboard.host = host;
            }
            if let Some(port) = port {
                config.dashboard.port = port;
            }
            if no_browser {
                config.dashboard.open_browser = false;
            }

            let crawler = match config.dashboard.crawler_program.clone() {
                Some(program) => program,
                None => std::env::current_exe().context("Cannot locate own executable")?,
            };
            dashboard::serve(&config, crawler).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
