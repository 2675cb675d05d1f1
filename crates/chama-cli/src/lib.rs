// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod command_output_adapters;
mod commands;

use chama_core::{ErrorCode, ExitCode, MachineError};
use chama_sync::{validate_startup_config_contract, SyncConfig};
use clap::{error::ErrorKind, ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

const CHAMA_HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
Usage: {usage}

Options:
{options}

Commands:
{subcommands}
{after-help}";

#[derive(Parser)]
#[command(name = "chama", version)]
#[command(about = "Offline inspection of chama records, invites and client state")]
#[command(help_template = CHAMA_HELP_TEMPLATE)]
#[command(
    after_help = "Environment:\n  RUST_LOG         Log filter override\n  CHAMA_LOG_JSON   Emit logs as JSON lines"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a viewer's access level from a chama snapshot.
    Access {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        viewer: Option<String>,
    },
    /// Merge an off-chain record with a contract read.
    Reconcile {
        #[arg(long)]
        record: PathBuf,
        #[arg(long, conflicts_with_all = ["chain_failed", "chain_missing"])]
        chain: Option<PathBuf>,
        #[arg(long, conflicts_with = "chain_missing")]
        chain_failed: Option<String>,
        #[arg(long)]
        chain_missing: Option<String>,
    },
    Invite {
        #[command(subcommand)]
        command: InviteCommand,
    },
    /// Contribution standings and reliability per member.
    Rounds {
        #[arg(long)]
        rounds: PathBuf,
        #[arg(long)]
        chama: PathBuf,
        #[arg(long = "member", conflicts_with = "members_file")]
        members: Vec<String>,
        /// JSON array of membership rows; keeps deposit and inactive states.
        #[arg(long)]
        members_file: Option<PathBuf>,
        #[arg(long)]
        now: Option<u64>,
    },
    State {
        #[command(subcommand)]
        command: StateCommand,
    },
}

#[derive(Subcommand)]
enum InviteCommand {
    Issue {
        #[arg(long)]
        inviter: String,
        #[arg(long)]
        chama: Option<String>,
        #[arg(long)]
        max_uses: Option<u32>,
        #[arg(long)]
        now: Option<u64>,
    },
    Inspect {
        code: String,
    },
}

#[derive(Subcommand)]
enum StateCommand {
    Migrate {
        #[arg(long)]
        path: PathBuf,
    },
}

#[derive(Clone, Copy)]
pub(crate) struct OutputMode {
    pub(crate) json: bool,
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => {
                return Err(CliError {
                    exit_code: ExitCode::Usage,
                    machine: MachineError::new("usage_error", "invalid command line arguments")
                        .with_detail("error", &err.to_string()),
                });
            }
        },
    };
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let config = SyncConfig::from_env();
    chama_sync::telemetry::init_tracing(config.log_json, level);
    validate_startup_config_contract(&config)
        .map_err(|message| CliError::coded(ErrorCode::ValidationError, message))?;

    let output_mode = OutputMode { json: cli.json };
    let command = cli.command.ok_or_else(|| CliError {
        exit_code: ExitCode::Usage,
        machine: MachineError::new("usage_error", "missing command; see --help"),
    })?;

    match command {
        Commands::Access { snapshot, viewer } => {
            commands::run_access(&snapshot, viewer.as_deref(), output_mode)
        }
        Commands::Reconcile {
            record,
            chain,
            chain_failed,
            chain_missing,
        } => commands::run_reconcile(
            &record,
            commands::ChainInput::from_flags(chain, chain_failed, chain_missing),
            output_mode,
        ),
        Commands::Invite { command } => match command {
            InviteCommand::Issue {
                inviter,
                chama,
                max_uses,
                now,
            } => commands::run_invite_issue(
                &inviter,
                chama.as_deref(),
                max_uses.unwrap_or(config.invite_max_uses),
                now,
                output_mode,
            ),
            InviteCommand::Inspect { code } => commands::run_invite_inspect(&code, output_mode),
        },
        Commands::Rounds {
            rounds,
            chama,
            members,
            members_file,
            now,
        } => commands::run_rounds(
            &rounds,
            &chama,
            commands::RosterInput::from_flags(members, members_file),
            now,
            &config.reliability,
            output_mode,
        ),
        Commands::State { command } => match command {
            StateCommand::Migrate { path } => commands::run_state_migrate(&path, output_mode),
        },
    }
}

#[derive(Debug)]
pub(crate) struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    pub(crate) fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            exit_code: code.exit_code(),
            machine: MachineError::from_code(code, &message),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::coded(ErrorCode::InternalError, message)
    }

    pub(crate) fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.machine = self.machine.with_detail(key, value);
        self
    }
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match serde_json::to_string(&error.machine) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("{}", error.machine.message);
    }
}
