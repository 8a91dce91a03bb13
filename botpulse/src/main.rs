//! botpulse - terminal monitor for the bot usage analytics API
//!
//! This tool provides commands for:
//! - Showing the resolved client configuration
//! - Fetching one analytics snapshot with the usual retry budget
//! - Watching the analytics API, refreshing on a timer or on demand
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/botpulse/config.toml (~/.config/botpulse/config.toml)
//! - Logs: $XDG_STATE_HOME/botpulse/botpulse.log.<date> (~/.local/state/botpulse/)

mod render;

use anyhow::{bail, Context, Result};
use botpulse_core::config::API_URL_ENV;
use botpulse_core::{Config, PollScheduler, ReqwestTransport, RetryController, SnapshotStore};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "botpulse")]
#[command(about = "Monitor bot usage analytics")]
#[command(version)]
struct Args {
    /// Analytics API base URL (overrides config and BOTPULSE_API_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Write a log file to the XDG state directory
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the resolved configuration
    Config,

    /// Fetch analytics once, retrying on failure, and print the result
    Status,

    /// Keep polling and print every change; press Enter to refresh
    Watch,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config =
        Config::load_with_override(args.url.clone()).context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        let guard = botpulse_core::logging::init(&config.logging)
            .context("failed to initialize logging")?;
        Some(guard)
    } else {
        None
    };

    match args.command {
        Command::Config => cmd_config(&config),
        Command::Status => runtime()?.block_on(cmd_status(&config)),
        Command::Watch => runtime()?.block_on(cmd_watch(&config)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}

fn cmd_config(config: &Config) -> Result<()> {
    let api = &config.api;

    println!("botpulse Configuration");
    println!("======================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!(
        "Log file:        {}",
        botpulse_core::logging::log_file_path().display()
    );
    println!();
    println!("Base URL:        {}", api.normalized_base_url());
    println!("Max Retries:     {}", api.max_attempts);
    println!("Retry Delay:     {}ms", api.retry_delay_ms);
    println!("Poll Interval:   {}ms", api.poll_interval_ms);
    println!("Timeout:         {}s", api.timeout_secs);
    println!("Log Level:       {}", config.logging.level);
    println!();
    println!("Set {} or pass --url to point at another API.", API_URL_ENV);

    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let transport =
        Arc::new(ReqwestTransport::new(&config.api).context("failed to build HTTP client")?);
    let controller = RetryController::from_config(transport, &config.api, SnapshotStore::new());

    println!("Fetching analytics from {}", config.api.normalized_base_url());
    println!();

    let report = controller.run().await;
    print!("{}", render::render_view(&controller.store().current()));

    if !report.succeeded() {
        bail!(
            "could not fetch analytics after {} attempt(s)",
            report.attempts
        );
    }

    Ok(())
}

async fn cmd_watch(config: &Config) -> Result<()> {
    let transport =
        Arc::new(ReqwestTransport::new(&config.api).context("failed to build HTTP client")?);
    let scheduler =
        PollScheduler::from_config(transport, &config.api).context("invalid API configuration")?;
    let mut updates = scheduler.store().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!(
        "Watching {} every {}s (Enter to refresh, Ctrl-C to quit)",
        config.api.normalized_base_url(),
        scheduler.poll_interval().as_secs()
    );
    let text = render::render_view(&updates.borrow_and_update());
    println!();
    print!("{}", text);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = render::render_view(&updates.borrow_and_update());
                println!();
                print!("{}", text);
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => drop(scheduler.refresh()),
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
