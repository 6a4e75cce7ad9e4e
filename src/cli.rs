//! Command-line interface built on clap.
//!
//! [`Cli`] carries the subcommands in [`Command`] and the global flags
//! (`--config`, `--mode`, `--verbose`).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ml_executor::ExecutionMode;
use ml_executor::agent::RiskLevel;

/// Runs ML operations against the inference service and queries the
/// resources agent and document analysis endpoints.
#[derive(Debug, Parser)]
#[command(name = "ml-executor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./ml-executor.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured execution mode.
    #[arg(long, global = true)]
    pub mode: Option<ModeArg>,

    /// Debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Local,
    Remote,
    RemoteWithLocalFallback,
}

impl From<ModeArg> for ExecutionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Local => ExecutionMode::Local,
            ModeArg::Remote => ExecutionMode::Remote,
            ModeArg::RemoteWithLocalFallback => ExecutionMode::RemoteWithLocalFallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs one logical operation, e.g. `risk_predictions`.
    Invoke {
        operation: String,

        /// Inline JSON object sent as the payload.
        #[arg(long, conflicts_with = "file")]
        payload: Option<String>,

        /// File containing the JSON payload.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Checks that the ML service answers its health endpoint.
    Health,

    /// Lists the registered operations and their paths.
    Operations,

    /// Asks the agent for study resources on a subject.
    Resources {
        #[arg(long)]
        student: String,

        #[arg(long)]
        subject: String,

        /// Current grade on the 0–100 scale.
        #[arg(long)]
        grade: f64,

        #[arg(long, value_enum, default_value_t = RiskArg::Medium)]
        risk: RiskArg,

        /// Kind of help needed (tutoring, resources, intervention, ...).
        #[arg(long)]
        need: Option<String>,
    },

    /// Estimates the AI-generated share of a document.
    Analyze { path: PathBuf },
}
