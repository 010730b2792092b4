use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ehrgate")]
#[command(about = "ehrgate CLI: replay access scenarios against an in-memory ledger")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Gateway config file (TOML). Defaults apply when omitted
    #[arg(short, long, global = true, env = "EHRGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every step of a scenario file, one transaction per step
    Replay(ReplayArgs),
    /// List the invocable function names
    Functions,
    /// Inspect gateway configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Path to the scenario JSON file
    pub scenario: PathBuf,
    /// Keep running after a step misses its expectation
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective config, env overrides applied
    Show,
}
