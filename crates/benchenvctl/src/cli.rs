//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap.
//! Keeps argument parsing separate from execution logic.

use benchenv_common::Profile;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const EXAMPLES: &str = "Examples:
  benchenvctl enter lab                 # Enter lab environment
  benchenvctl enter prod                # Enter production environment
  benchenvctl restore                   # Restore original settings
  benchenvctl run lab -- ./bench.sh     # Run a command inside lab, then restore";

/// benchenv CLI
#[derive(Parser, Debug)]
#[command(name = "benchenvctl")]
#[command(about = "Manage system environment configurations for energy benchmarking", long_about = None)]
#[command(version = env!("BENCHENV_VERSION"))]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/benchenv/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot file (overrides the configured snapshot_path)
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Log every sysfs read and privileged write
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enter an environment configuration
    Enter {
        /// Environment to enter
        #[arg(value_enum)]
        environment: Environment,
    },

    /// Restore original system configuration
    Restore,

    /// Run a command inside an environment and restore afterwards
    Run {
        /// Environment to run in
        #[arg(value_enum)]
        environment: Environment,

        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Show the current host state
    Status {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Enter { .. } => "enter",
            Commands::Restore => "restore",
            Commands::Run { .. } => "run",
            Commands::Status { .. } => "status",
        }
    }
}

/// Environment names as typed on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Light,
    Lab,
}

impl From<Environment> for Profile {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Prod => Profile::Production,
            Environment::Light => Profile::Lightweight,
            Environment::Lab => Profile::Lab,
        }
    }
}
