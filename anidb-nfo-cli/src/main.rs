//! anidb-nfo CLI
//!
//! Command-line interface for identifying anime directories against AniDB
//! and binding their episode files.

mod commands;
mod error;
mod spinner;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

pub(crate) use error::CliError;

#[derive(Parser)]
#[command(name = "anidb-nfo")]
#[command(about = "Identify anime directories against AniDB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve anime directories to AniDB ids and bind their episode files
    Identify {
        /// Anime directories, one show per directory
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Use this AniDB id instead of matching the directory name
        #[arg(long)]
        aid: Option<u32>,

        /// Link this AniList id instead of searching
        #[arg(long = "anilistid")]
        anilist: Option<u32>,

        /// Link this TMDB id instead of searching
        #[arg(long = "tmdbid")]
        tmdb: Option<u32>,

        /// Refetch AniDB metadata even if the cached copy is fresh
        #[arg(short, long)]
        force_update: bool,
    },

    /// Manage cached datasets and metadata
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show settings and manage credentials
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached files
    List,

    /// Remove all cached files
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective settings
    Show,

    /// Show current credentials and their sources
    Credentials,

    /// Store credentials in the config file
    SetCredentials {
        /// Registered AniDB HTTP client name
        #[arg(long)]
        anidb_client: Option<String>,

        /// Version the AniDB client was registered with
        #[arg(long)]
        anidb_version: Option<String>,

        /// AniList API token
        #[arg(long)]
        anilist_token: Option<String>,

        /// TMDB API key
        #[arg(long)]
        tmdb_api_key: Option<String>,
    },

    /// Print the settings and credentials file paths
    Path,
}

fn main() {
    init_logger();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Identify {
            dirs,
            aid,
            anilist,
            tmdb,
            force_update,
        } => commands::identify::run_identify(commands::identify::IdentifyArgs {
            dirs,
            aid,
            anilist,
            tmdb,
            force_update,
        }),
        Commands::Cache { action } => match action {
            CacheAction::List => commands::cache::run_cache_list(),
            CacheAction::Clear => commands::cache::run_cache_clear(),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(),
            ConfigAction::Credentials => commands::credentials::run_credentials_show(),
            ConfigAction::SetCredentials {
                anidb_client,
                anidb_version,
                anilist_token,
                tmdb_api_key,
            } => commands::credentials::run_credentials_set(
                anidb_client,
                anidb_version,
                anilist_token,
                tmdb_api_key,
            ),
            ConfigAction::Path => commands::config::run_config_path(),
        },
    };

    if let Err(e) = result {
        log::error!(
            "{} {}",
            "\u{2718}".if_supports_color(Stdout, |t| t.red()),
            e,
        );
        std::process::exit(1);
    }
}

/// Plain message output on stdout; `RUST_LOG` overrides the `info` default.
fn init_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

pub(crate) fn log_blank() {
    log::info!("");
}

/// Format a byte size as a human-readable string.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
