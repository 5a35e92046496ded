//! prefsync command line
//!
//! Validates session configurations and replays recorded respondent event
//! logs into a persisted session snapshot.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use prefsync::{
    parse_command_log, snapshot, CommandOutcome, ElicitResult, ElicitationConfig,
    ElicitationSession, ElicitError,
};

#[derive(Debug, Parser)]
#[command(name = "prefsync", version, about = "Preference elicitation engine")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Load and validate a session configuration.
    Validate {
        config: PathBuf,
    },
    /// Print the built-in demonstration configuration.
    DemoConfig,
    /// Apply a JSON Lines event log to a fresh session and emit its snapshot.
    Replay {
        config: PathBuf,
        events: PathBuf,
        /// Write the snapshot here instead of stdout.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> ElicitResult<()> {
    match cli.command {
        Cmd::Validate { config } => {
            let config = ElicitationConfig::from_path(&config)?;
            info!(
                budget = config.budget,
                priorities = config.priorities.len(),
                stages = config.stages.len(),
                "configuration is valid"
            );
            println!("ok");
        }
        Cmd::DemoConfig => {
            println!("{}", ElicitationConfig::demo().to_json_pretty()?);
        }
        Cmd::Replay {
            config,
            events,
            out,
        } => {
            let config = ElicitationConfig::from_path(&config)?;
            let raw = std::fs::read_to_string(&events).map_err(|e| {
                ElicitError::internal(format!("read events {}: {e}", events.display()))
            })?;
            let commands = parse_command_log(&raw)?;

            let mut session = ElicitationSession::new(&config)?;
            for (n, command) in commands.into_iter().enumerate() {
                let op = command.name();
                match session.apply(command)? {
                    CommandOutcome::Edit { outcome } => {
                        if let Some(reason) = outcome.reason() {
                            warn!(event = n + 1, op, %reason, "edit rejected");
                        }
                    }
                    CommandOutcome::Confirmed { result } => {
                        info!(event = n + 1, stage_index = result.stage_index, "stage confirmed");
                    }
                }
            }

            let json = snapshot::to_json_pretty(&session.snapshot())?;
            match out {
                Some(path) => std::fs::write(&path, json).map_err(|e| {
                    ElicitError::internal(format!("write snapshot {}: {e}", path.display()))
                })?,
                None => println!("{json}"),
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
