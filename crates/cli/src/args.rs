//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// quiet-hn: the current Hacker News top story links, without the noise
#[derive(Parser, Debug)]
#[command(name = "quiet-hn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current top stories once
    Top(TopArgs),

    /// Keep the list fresh, printing it whenever it is refreshed
    Watch(WatchArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and upstream reachability
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Number of stories to show (overrides pipeline.num_wanted)
    #[arg(short = 'n', long)]
    pub num_stories: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Number of stories to show (overrides pipeline.num_wanted)
    #[arg(short = 'n', long)]
    pub num_stories: Option<usize>,

    /// Seconds between refresh checks (overrides watch.refresh_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Run a single refresh check and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (file + environment) as TOML
    Show,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Skip the upstream reachability check
    #[arg(long)]
    pub offline: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
