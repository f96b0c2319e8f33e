//! gtanalyzer CLI - contribution analysis for GitHub repositories and Taiga boards.

mod commands;
mod config;
#[cfg(any(feature = "github", feature = "taiga"))]
mod progress;
mod server;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gtanalyzer")]
#[command(version)]
#[command(about = "Per-contributor activity analysis for GitHub and Taiga")]
#[command(
    long_about = "gtanalyzer collects per-contributor activity for batches of GitHub \
repositories (commits, line statistics, pull request roles) and Taiga boards \
(milestones, user stories, tasks and their history). Batches run in the \
background; results are polled by request id, either from the HTTP server or \
printed as JSON once a CLI batch drains."
)]
#[command(after_long_help = r#"EXAMPLES
    Analyze two repositories of an organization:
        $ gtanalyzer github analyze --owner rust-lang cargo rustup

    Restrict commits to a date window:
        $ gtanalyzer github analyze --owner octo --since 2024-01-01 --until 2024-03-31 hello-world

    Analyze Taiga boards by slug:
        $ gtanalyzer taiga analyze team-alpha team-beta

    List milestone dates of a board:
        $ gtanalyzer taiga milestones team-alpha

    Serve the HTTP API:
        $ gtanalyzer serve --bind 0.0.0.0:8000

    Generate shell completions:
        $ gtanalyzer completions bash > ~/.local/share/bash-completion/completions/gtanalyzer

CONFIGURATION
    gtanalyzer reads configuration from:
      1. ~/.config/gtanalyzer/config.toml (or $XDG_CONFIG_HOME/gtanalyzer/config.toml)
      2. ./gtanalyzer.toml
      3. Environment variables (GTANALYZER_* prefix, e.g., GTANALYZER_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GTANALYZER_GITHUB_TOKEN   GitHub personal access token
    GTANALYZER_TAIGA_TOKEN    Taiga bearer token
    GTANALYZER_SERVER_BIND    Address for `gtanalyzer serve` (default: 127.0.0.1:8000)
    RUST_LOG                  Log filter when stdout is not a terminal
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GitHub repository analysis
    #[cfg(feature = "github")]
    Github {
        #[command(subcommand)]
        action: GithubAction,
    },
    /// Taiga board analysis
    #[cfg(feature = "taiga")]
    Taiga {
        #[command(subcommand)]
        action: TaigaAction,
    },
    /// Serve the HTTP API
    Serve {
        /// Socket address to listen on (default from config or 127.0.0.1:8000)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(feature = "github")]
#[derive(Subcommand)]
enum GithubAction {
    /// Analyze repositories of one owner and print the results as JSON
    Analyze {
        /// Repository owner (user or organization)
        #[arg(short, long)]
        owner: String,

        /// Only include commits after this date (ISO-8601)
        #[arg(long)]
        since: Option<String>,

        /// Only include commits before this date (ISO-8601)
        #[arg(long)]
        until: Option<String>,

        /// GitHub token (overrides config)
        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Repository names
        #[arg(required = true)]
        repositories: Vec<String>,
    },
}

#[cfg(feature = "taiga")]
#[derive(Subcommand)]
enum TaigaAction {
    /// Analyze boards and print the results as JSON
    Analyze {
        /// Taiga token (overrides config)
        #[arg(short, long, env = "TAIGA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Board (project) slugs
        #[arg(required = true)]
        boards: Vec<String>,
    },
    /// Print the milestone dates of a board
    Milestones {
        /// Taiga token (overrides config)
        #[arg(short, long, env = "TAIGA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Board (project) slug
        board: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Set up graceful shutdown handler (Ctrl+C)
    shutdown::setup_shutdown_handler();

    // Structured logging only when not connected to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("gtanalyzer=info,gtanalyzer_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "github")]
        Commands::Github { action } => {
            commands::github::handle_github(action, &config).await?;
        }
        #[cfg(feature = "taiga")]
        Commands::Taiga { action } => {
            commands::taiga::handle_taiga(action, &config).await?;
        }
        Commands::Serve { bind } => {
            commands::serve::handle_serve(bind, config).await?;
        }
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output)?;
        }
    }

    Ok(())
}
