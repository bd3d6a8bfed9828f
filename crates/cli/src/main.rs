//! JurisFlow CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Initialize config and prompt files
//! - `serve`    Start the HTTP API
//! - `run`      Run the five-stage pipeline on a case description
//! - `invoke`   Invoke a single role
//! - `history`  Print a session's history
//! - `doctor`   Diagnose configuration and connectivity

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "jurisflow",
    about = "JurisFlow: multi-role AI case analysis",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "JURISFLOW_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and role prompt files
    Onboard,

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the full pipeline on a case description
    Run {
        /// The case description
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        message: Option<String>,

        /// Read the case description from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Link a new session to this client
        #[arg(long)]
        client: Option<String>,

        /// Link a new session to this attendance (requires --client)
        #[arg(long, requires = "client")]
        attendance: Option<String>,

        /// Act as this user instead of anonymously
        #[arg(long)]
        user: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Invoke a single role
    Invoke {
        /// redator, medico, estrategista or supervisor
        #[arg(short, long)]
        role: String,

        /// The message for the role. Omit with --session to have the role
        /// work on the session's history.
        #[arg(short, long)]
        message: Option<String>,

        #[arg(short, long)]
        session: Option<String>,

        #[arg(long)]
        client: Option<String>,

        #[arg(long, requires = "client")]
        attendance: Option<String>,

        #[arg(long)]
        user: Option<String>,
    },

    /// Answer a supervisor that asked for more information
    FollowUp {
        session: String,

        #[arg(short, long)]
        message: String,

        #[arg(long)]
        user: Option<String>,
    },

    /// Print a session's history
    History {
        session: String,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and model connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Run {
            message,
            file,
            session,
            client,
            attendance,
            user,
            json,
        } => {
            let message = match (message, file) {
                (Some(m), _) => m,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
                (None, None) => return Err("either --message or --file is required".into()),
            };
            commands::run::run(commands::run::RunArgs {
                message,
                session,
                client,
                attendance,
                user,
                json,
            })
            .await?
        }
        Commands::Invoke {
            role,
            message,
            session,
            client,
            attendance,
            user,
        } => {
            commands::invoke::run(commands::invoke::InvokeArgs {
                role,
                message,
                session,
                client,
                attendance,
                user,
            })
            .await?
        }
        Commands::FollowUp {
            session,
            message,
            user,
        } => commands::invoke::follow_up(session, message, user).await?,
        Commands::History {
            session,
            user,
            json,
        } => commands::history::run(session, user, json).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
