//! Tessera CLI, the main entry point.
//!
//! Commands:
//! - `chat`    Send a message to one or more agents
//! - `plan`    Show how the planner would split a request
//! - `models`  List the models available to each credential
//! - `search`  Query the workspace code index
//! - `config`  Inspect or initialize the configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::agent::ProviderKind;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tessera — multi-agent coding assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.tessera/config.toml
    #[arg(long, global = true, env = "TESSERA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the configured agents
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Target agent id (repeatable). Defaults to every worker agent.
        #[arg(short, long = "agent")]
        agents: Vec<String>,

        /// Attach an image file (repeatable)
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,

        /// Mount this directory as the workspace
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Single-shot generation without tools; images in the reply are saved
        #[arg(long)]
        creative: bool,

        /// Where creative mode saves generated images
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Ask the planner to split a request across the worker agents
    Plan {
        #[arg(short, long)]
        message: String,
    },

    /// List available models
    Models {
        /// Only list models for this provider
        #[arg(short, long)]
        provider: Option<ProviderKind>,
    },

    /// Search the workspace code index
    Search {
        query: String,

        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Match file names instead of ranking contents
        #[arg(long)]
        names: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Parse and validate the config file
    Validate,
    /// Print the config file location
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat {
            message,
            agents,
            images,
            workspace,
            creative,
            out_dir,
        } => {
            let options = commands::chat::ChatOptions {
                message,
                agents,
                images,
                workspace,
                creative,
                out_dir,
            };
            commands::chat::run(config_path, options).await?
        }
        Commands::Plan { message } => commands::plan::run(config_path, &message).await?,
        Commands::Models { provider } => commands::models::run(config_path, provider).await?,
        Commands::Search {
            query,
            workspace,
            names,
        } => commands::search::run(config_path, &query, workspace, names).await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Init => commands::config_cmd::init(config_path)?,
        },
    }

    Ok(())
}
