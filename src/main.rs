use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hookdash::cli::{self, FilterArgs, OutputFormat};
use hookdash::{activity, config};

#[derive(Debug, Parser)]
#[command(name = "hookdash")]
#[command(about = "Terminal dashboard for webhook traffic")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Live dashboard: refreshes on a timer, reads filter commands from stdin
    Watch,
    /// Fetch the dashboard summary once and print it
    Summary {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Fetch raw records, filter and aggregate them, and print the result
    Filter {
        #[command(flatten)]
        args: FilterArgs,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show recent refresh cycles from the cycle log
    History {
        /// Number of cycles to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective (merged) configuration
    Show,
    /// Write the default config to ~/.hookdash/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `refresh.interval_secs 30`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();
    let config = config::load();

    activity::init_tracing(&config.logging.level);
    if !config.display.color {
        colored::control::set_override(false);
    }

    let runtime = || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")
    };

    match app.command {
        Commands::Watch => runtime()?.block_on(cli::run_watch(&config)),
        Commands::Summary { format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            runtime()?.block_on(cli::run_summary(&config, fmt))
        }
        Commands::Filter { args, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            runtime()?.block_on(cli::run_filter(&config, &args, fmt))
        }
        Commands::History { limit, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_history(limit, fmt)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
