//! Clap derive structures for the `cafeed` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cafeed -- live contract-address mentions in your terminal
#[derive(Debug, Parser)]
#[command(
    name = "cafeed",
    version,
    about = "Watch live contract-address mentions from the command line",
    long_about = "Streams contract-address mention events from a feed server, keeps a \
        bounded local cache of recent events, and lets you search it offline.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Feed profile to use
    #[arg(long, short = 'p', env = "CAFEED_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Feed endpoint, ws:// or wss:// (overrides profile)
    #[arg(long, short = 's', env = "CAFEED_SERVER", global = true)]
    pub server: Option<String>,

    /// Access token (overrides keyring and profile)
    #[arg(long, env = "CAFEED_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAFEED_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live mentions as they arrive
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect the local event cache
    #[command(alias = "c")]
    Cache(CacheArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// While watching, type `p` + Enter to toggle pause, `c` to clear the
/// display, `n <network>` or `f <count>` to change the subscription, and
/// `q` to quit.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Start with the display paused (events are still cached)
    #[arg(long)]
    pub paused: bool,

    /// Exit after this many events have been displayed
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Network to subscribe to (overrides the profile filter)
    #[arg(long)]
    pub network: Option<String>,

    /// Minimum author follower count (overrides the profile filter)
    #[arg(long)]
    pub min_followers: Option<u64>,

    /// Stop after the first failure instead of reconnecting
    #[arg(long)]
    pub no_retry: bool,

    /// Skip reading and writing the on-disk cache
    #[arg(long)]
    pub no_cache: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CACHE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List cached events, newest first
    #[command(alias = "ls")]
    List {
        /// Maximum number of events to show
        #[arg(long, short = 'l', default_value = "25")]
        limit: usize,
    },

    /// Search cached events by text, author, symbol or address
    Search {
        /// Case-insensitive substring to look for
        query: String,

        /// Maximum number of events to show
        #[arg(long, short = 'l', default_value = "25")]
        limit: usize,
    },

    /// Show cache size and coverage
    Stats,

    /// Delete every cached event
    Clear,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration with secrets masked
    Show,

    /// Store the feed token in the system keyring
    SetToken {
        /// Profile name (default: the active profile)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file location
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
