//! vouch command-line launcher
//!
//! Every command prints a single JSON document on stdout. Lifecycle
//! outcomes that are not successes exit with status 2; errors print
//! `{"error": {...}}` and exit with status 1.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use vouch_core::{Action, RequestKind};
use vouch_logging::{init_logging, vouch_home, LogConfig};

mod commands;
mod config;

use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "vouch", about = "Maker-checker lifecycle over catalog-described entities")]
struct Cli {
    /// Mirror debug logs to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: $VOUCH_HOME/config.toml)
    #[arg(long, global = true, env = "VOUCH_CONFIG")]
    config: Option<PathBuf>,

    /// Acting identity for submit, decide and rectify
    #[arg(long, global = true, env = "VOUCH_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the staging, authoritative and history relations of every module
    Init,

    /// Authoritative rows of an entity matching one primary-key value
    Read {
        entity: String,

        /// Primary-key field to match
        #[arg(long)]
        field: String,

        /// Value to match (parsed as JSON when possible, else text)
        #[arg(long)]
        value: String,
    },

    /// Every authoritative row of an entity
    ReadAll { entity: String },

    /// Stage an ADD, UPDATE or DELETE request
    Submit {
        entity: String,

        #[arg(long, short = 'r')]
        request: RequestKind,

        /// Record as JSON, or @path to a JSON file
        #[arg(long, short = 'd')]
        data: String,
    },

    /// Approve, reject or return a pending request
    Decide {
        entity: String,

        #[arg(long, short = 'a')]
        action: Action,

        /// Primary-key fields as a JSON object, or @path
        #[arg(long, short = 'k')]
        key: String,

        #[arg(long)]
        remarks: Option<String>,
    },

    /// Correct a request returned for rectification and resubmit it
    Rectify {
        entity: String,

        /// Corrected record as JSON, or @path
        #[arg(long, short = 'd')]
        data: String,
    },

    /// Show resolved configuration
    Config,
}

fn run_command(cli: Cli) -> Result<bool> {
    let settings = Settings::resolve(&vouch_home(), cli.config.as_deref(), cli.actor)?;

    match cli.command {
        Commands::Init => commands::init(&settings),
        Commands::Read {
            entity,
            field,
            value,
        } => commands::read(&settings, &entity, &field, &value),
        Commands::ReadAll { entity } => commands::read_all(&settings, &entity),
        Commands::Submit {
            entity,
            request,
            data,
        } => commands::submit(&settings, &entity, request, &data),
        Commands::Decide {
            entity,
            action,
            key,
            remarks,
        } => commands::decide(&settings, &entity, action, &key, remarks.as_deref()),
        Commands::Rectify { entity, data } => commands::rectify(&settings, &entity, &data),
        Commands::Config => commands::show_config(&settings),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "vouch",
        verbose: cli.verbose,
        quiet: !cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            warn!("Command failed: {:#}", err);
            commands::print_error(&err);
            ExitCode::from(1)
        }
    }
}
