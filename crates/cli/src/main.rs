//! Dispatch CLI: the main entry point.
//!
//! Usage:
//!   dispatch serve [--host H] [--port P]   Run the HTTP API
//!   dispatch chat [--lane L]               Interactive session
//!   dispatch ask [--lane L] <message>      One conversation turn
//!   dispatch draft [--yes] <request>       Draft a new note and save it
//!   dispatch search <query>                Search the vault
//!   dispatch standup                       Run the daily standup
//!   dispatch history <lane> [--clear]      Show or reset a lane's history
//!   dispatch status                        Vault and lane overview
//!   dispatch init [--name N]               Create the vault layout

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dispatch_core::Lane;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "dispatch")]
#[command(about = "Dispatch: one assistant, seven lanes, one Markdown vault")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.dispatch/config.toml)
    #[arg(long, global = true, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Talk to a lane interactively
    Chat {
        /// Lane to start in (defaults to dispatch)
        #[arg(short, long)]
        lane: Option<Lane>,
    },

    /// Send one message to a lane and print the reply
    Ask {
        /// Lane to talk to; detected from the message when omitted
        #[arg(short, long)]
        lane: Option<Lane>,
        /// The message
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Have the coordinator draft a new note
    Draft {
        /// Save without asking
        #[arg(short, long)]
        yes: bool,
        /// What the note should be
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Search note contents, case-insensitively
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Run the standup across all lanes and save the note
    Standup,

    /// Show a lane's conversation history
    History {
        lane: Lane,
        /// Reset the history instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Show vault and lane status
    Status,

    /// Create the vault folders and per-lane memory files
    Init {
        /// Your name, used in the Self/README.md profile note
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = dispatch_config::AppConfig::load_with(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config, host, port).await?,
        Commands::Chat { lane } => commands::chat::run(config, lane).await?,
        Commands::Ask { lane, message } => commands::ask::run(config, lane, message.join(" ")).await?,
        Commands::Draft { yes, request } => commands::draft::run(config, request.join(" "), yes).await?,
        Commands::Search { query } => commands::search::run(config, query.join(" ")).await?,
        Commands::Standup => commands::standup::run(config).await?,
        Commands::History { lane, clear } => commands::history::run(config, lane, clear).await?,
        Commands::Status => commands::status::run(config).await?,
        Commands::Init { name } => commands::init::run(config, name).await?,
    }

    Ok(())
}
