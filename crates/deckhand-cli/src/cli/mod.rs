//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use deckhand_core::config;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version)]
#[command(about = "Build and revise slide decks by conversation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter for stderr (e.g. "info", "deckhand_core=debug"); overrides RUST_LOG
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Runs one instruction and streams events as JSON lines
    Exec {
        /// The instruction to send to the agent
        #[arg(short, long)]
        prompt: String,

        /// Session to act on (created if unknown)
        #[arg(short, long, value_name = "ID")]
        session: Option<String>,

        /// Continuation token from a previous run
        #[arg(long, value_name = "TOKEN")]
        resume: Option<String>,

        /// Treat this as a revision of an existing deck
        #[arg(long = "continue")]
        continuation: bool,

        /// Reference file to include with the instruction (repeatable)
        #[arg(long = "context", value_name = "FILE")]
        context: Vec<PathBuf>,
    },

    /// Inspect saved sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum SessionCommands {
    /// Lists saved sessions
    List,
    /// Shows a saved session as JSON
    Show {
        /// The ID of the session to show
        #[arg(value_name = "SESSION_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Exec {
            prompt,
            session,
            resume,
            continuation,
            context,
        } => {
            let config = config::Config::load().context("load config")?;
            commands::exec::run(commands::exec::ExecRunOptions {
                config: &config,
                prompt: &prompt,
                session_id: session.as_deref(),
                resume_token: resume.as_deref(),
                continuation,
                context_files: &context,
            })
            .await
        }

        Commands::Sessions { command } => {
            let config = config::Config::load().context("load config")?;
            match command {
                SessionCommands::List => commands::sessions::list(&config).await,
                SessionCommands::Show { id } => commands::sessions::show(&config, &id).await,
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
