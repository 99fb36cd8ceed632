//! lazytodo - a terminal UI for todo.txt.
//!
//! Running `lazytodo` with no arguments opens the todo file named by the
//! todo.txt config (`~/.todo/config` or `TODOTXT_CFG_FILE`) and keeps it in
//! sync with external edits.
//!
//! # Environment Variables
//!
//! See the [`config`](lazytodo::config) module for available configuration options.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lazytodo::config::Config;
use lazytodo::tui::{self, ui::KEY_BINDINGS};

const ENVIRONMENT_HELP: &str = "\
ENVIRONMENT VARIABLES:
    TODOTXT_CFG_FILE            todo.txt config file (default: ~/.todo/config)
    LAZYTODO_DEBOUNCE_MS        Change debounce interval (default: 300)
    LAZYTODO_SELF_WRITE_TTL_MS  Own-write suppression window (default: 500)
    LAZYTODO_POLL_INTERVAL_MS   Polling fallback interval, 0 disables it (default: 2000)
    LAZYTODO_WATCH_MODE         auto or poll (default: auto)
    LAZYTODO_REFRESH_MS         Reload check interval (default: 1000)
    LAZYTODO_LOG_FILE           Write logs to this file (default: no logging)
    RUST_LOG                    Log filter (default: info)";

/// lazytodo - a terminal UI for todo.txt.
///
/// Edits the todo.txt file in place and reloads it when another program
/// changes it.
#[derive(Parser, Debug)]
#[command(name = "lazytodo")]
#[command(version, about, long_about = None, disable_version_flag = true)]
#[command(after_help = after_help())]
struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    _version: (),
}

fn after_help() -> String {
    let mut text = String::from("KEY BINDINGS:\n");
    for (keys, action) in KEY_BINDINGS {
        text.push_str(&format!("    {keys:<13} {action}\n"));
    }
    text.push('\n');
    text.push_str(ENVIRONMENT_HELP);
    text
}

fn main() -> Result<()> {
    let _cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(config.log_file.as_deref())?;

    info!(
        todo_dir = %config.todo_dir.display(),
        todo_file = %config.todo_file.display(),
        done_file = %config.done_file.display(),
        strategy = ?config.watch.strategy,
        debounce_ms = config.watch.debounce.as_millis() as u64,
        "Starting lazytodo"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime
        .block_on(tui::run(&config))
        .context("lazytodo exited with an error")
}

/// Initializes file logging. Without a log file nothing is installed, since
/// the terminal belongs to the TUI.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}
