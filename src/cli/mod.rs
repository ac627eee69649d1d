//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `hookdash watch`: live dashboard, refreshed on a timer, driven by stdin
//! - `hookdash summary`: one summary refresh, printed once
//! - `hookdash filter --range R --source S`: one filtered view, printed once
//! - `hookdash history --limit N`: recent refresh cycles from the cycle log
//! - `hookdash config show|init|set|reset`: configuration management

use std::io;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::activity::{self, CycleLog, CycleLogEntry};
use crate::aggregate::DateRangeOption;
use crate::api::ApiClient;
use crate::config::{self, HookdashConfig};
use crate::controller::{self, CyclePhase, DashboardController, UserAction};
use crate::filter::FilterCriteria;
use crate::render::terminal::{Screen, ScreenOptions, SharedScreen, terminal_presentation};

/// Help line shown under the live dashboard.
const WATCH_HELP: &str =
    "commands: filter [--range R] [--from D] [--to D] [--source S]... | reset | refresh | quit";

/// Output format for one-shot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter arguments
// ---------------------------------------------------------------------------

/// Filter flags shared by `hookdash filter` and the watch-mode `filter`
/// command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct FilterArgs {
    /// Date range: today, yesterday, week, month or custom
    #[arg(long)]
    pub range: Option<DateRangeOption>,
    /// Custom start date (YYYY-MM-DD); implies --range custom
    #[arg(long)]
    pub from: Option<String>,
    /// Custom end date (YYYY-MM-DD); implies --range custom
    #[arg(long)]
    pub to: Option<String>,
    /// Only include this source (repeatable; default: all sources)
    #[arg(long = "source")]
    pub sources: Vec<String>,
}

impl FilterArgs {
    /// Turn the flags into criteria. Giving `--from` or `--to` without
    /// `--range` selects `custom`; otherwise the default is `week`.
    pub fn criteria(&self) -> FilterCriteria {
        let has_custom = self.from.is_some() || self.to.is_some();
        let date_range = self.range.unwrap_or(if has_custom {
            DateRangeOption::Custom
        } else {
            DateRangeOption::Week
        });

        FilterCriteria {
            date_range,
            date_from: self.from.clone(),
            date_to: self.to.clone(),
            sources: self.sources.iter().map(|s| s.trim().to_lowercase()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Watch-mode input
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "hookdash", no_binary_name = true, disable_help_subcommand = true)]
struct WatchLine {
    #[command(subcommand)]
    command: WatchCommand,
}

#[derive(Debug, Subcommand)]
enum WatchCommand {
    /// Apply a filter
    Filter(FilterArgs),
    /// Restore the default filter and refresh
    Reset,
    /// Refresh now
    Refresh,
    /// Leave the dashboard
    #[command(alias = "exit", alias = "q")]
    Quit,
}

/// Parse one line typed into the live dashboard.
///
/// Blank lines yield `Ok(None)`.
pub fn parse_action(line: &str) -> Result<Option<UserAction>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }

    let parsed = WatchLine::try_parse_from(words)?;
    Ok(Some(match parsed.command {
        WatchCommand::Filter(args) => UserAction::Filter(args.criteria()),
        WatchCommand::Reset => UserAction::Reset,
        WatchCommand::Refresh => UserAction::Refresh,
        WatchCommand::Quit => UserAction::Quit,
    }))
}

/// Forward stdin lines as actions until the receiver goes away.
///
/// On EOF the sender is kept alive, so a dashboard with no terminal
/// attached keeps refreshing instead of exiting.
async fn read_actions(tx: UnboundedSender<UserAction>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_action(&line) {
                Ok(Some(action)) => {
                    if tx.send(action).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    let first = e.to_string();
                    let first = first.lines().next().unwrap_or_default().to_string();
                    eprintln!("{} {}", "✗".red().bold(), first);
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }

    tx.closed().await;
}

// ---------------------------------------------------------------------------
// Controller wiring
// ---------------------------------------------------------------------------

fn screen_options(config: &HookdashConfig) -> ScreenOptions {
    ScreenOptions {
        title: format!("hookdash · {}", config.api.base_url.trim_end_matches('/')),
        known_sources: config.display.sources.clone(),
        window_days: config.refresh.window_days,
        ..ScreenOptions::default()
    }
}

fn build_controller(
    config: &HookdashConfig,
    options: ScreenOptions,
) -> (DashboardController, SharedScreen) {
    let screen = Screen::new(Box::new(io::stdout()), config.palette.clone(), options).shared();

    let controller = DashboardController::new(
        ApiClient::from_config(&config.api),
        terminal_presentation(&screen),
        config.refresh.clone(),
        config.palette.clone(),
        &config.display.sources,
    )
    .with_cycle_log(CycleLog::from_config(config.logging.cycle_log));

    (controller, screen)
}

// ---------------------------------------------------------------------------
// hookdash watch
// ---------------------------------------------------------------------------

/// Run the live dashboard until `quit`.
pub async fn run_watch(config: &HookdashConfig) -> Result<()> {
    let options = ScreenOptions {
        clear: config.display.clear_screen,
        auto_redraw: true,
        footer: Some(WATCH_HELP.to_string()),
        ..screen_options(config)
    };
    let (mut controller, _screen) = build_controller(config, options);

    let (tx, rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_actions(tx));

    let every = std::time::Duration::from_secs(config.refresh.interval_secs.max(1));
    controller::run(&mut controller, rx, every).await;

    reader.abort();
    Ok(())
}

// ---------------------------------------------------------------------------
// hookdash summary / filter
// ---------------------------------------------------------------------------

/// Fetch the summary once and print it.
pub async fn run_summary(config: &HookdashConfig, format: OutputFormat) -> Result<()> {
    let (mut controller, screen) = build_controller(config, screen_options(config));
    controller.start();
    controller.refresh().await;
    print_once(&controller, &screen, format)
}

/// Fetch one filtered view and print it.
pub async fn run_filter(
    config: &HookdashConfig,
    args: &FilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let (mut controller, screen) = build_controller(config, screen_options(config));
    controller.start();
    controller.apply_filters(&args.criteria()).await;
    print_once(&controller, &screen, format)
}

/// Print the screen once. A failed cycle still prints its error frame,
/// then fails the command.
fn print_once(
    controller: &DashboardController,
    screen: &SharedScreen,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(screen.borrow().state())
                .context("failed to serialize dashboard state")?;
            println!("{json}");
        }
        OutputFormat::Table => {
            screen
                .borrow_mut()
                .draw()
                .context("failed to write dashboard")?;
        }
    }

    if controller.phase() == CyclePhase::ErrorDisplayed {
        anyhow::bail!("dashboard refresh failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// hookdash history
// ---------------------------------------------------------------------------

/// Show the most recent refresh cycles.
pub fn run_history(limit: usize, format: OutputFormat) -> Result<()> {
    let path = activity::cycle_log_path().context("could not determine home directory")?;
    let entries = activity::read_recent(&path, limit);

    if entries.is_empty() {
        println!(
            "{}",
            "No refresh cycles logged yet. Run `hookdash watch` or `hookdash summary` first."
                .yellow()
        );
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&entries).context("failed to serialize history")?;
            println!("{json}");
        }
        OutputFormat::Table => print_history_table(&entries),
    }
    Ok(())
}

fn print_history_table(entries: &[CycleLogEntry]) {
    println!("{}", "Recent Refresh Cycles".bold().cyan());
    println!("{}", "=".repeat(70));
    println!(
        "  {:<20} {:<8} {:>5} {:<10} {:>8} {:>9}",
        "Time", "Kind", "Gen", "Outcome", "Records", "Latency"
    );
    println!("  {}", "-".repeat(66));

    for entry in entries {
        let time = chrono::DateTime::parse_from_rfc3339(&entry.timestamp)
            .map(|dt| {
                dt.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|_| entry.timestamp.clone());
        let records = entry
            .records
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<20} {:<8} {:>5} {} {:>8} {:>7}ms",
            time,
            entry.kind,
            entry.generation,
            colorize_outcome(&entry.outcome),
            records,
            entry.latency_ms
        );
        if let Some(message) = &entry.message {
            let kind = entry.error_kind.as_deref().unwrap_or("error");
            println!("  {:<20} {}", "", format!("{kind}: {message}").dimmed());
        }
    }
}

fn colorize_outcome(outcome: &str) -> colored::ColoredString {
    let padded = format!("{outcome:<10}");
    match outcome {
        "rendered" => padded.green(),
        "error" => padded.red(),
        "discarded" => padded.yellow(),
        _ => padded.normal(),
    }
}

// ---------------------------------------------------------------------------
// hookdash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective hookdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source_line("~/.hookdash/config.toml", global_exists);
    print_source_line(".hookdash.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "HOOKDASH_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source_line(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.hookdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Edit the file to point hookdash at your backend.".dimmed()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
