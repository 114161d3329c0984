//! Logging for benchenvctl operations
//!
//! Diagnostics go through `tracing` to stderr. Each invocation also appends
//! one JSON line to an XDG state file so host changes can be audited later.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. `BENCHENV_LOG` takes precedence over
/// the verbosity flag.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("BENCHENV_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Log entry for each benchenvctl invocation
#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 timestamp
    pub ts: String,

    /// Request ID (UUID)
    pub req_id: String,

    /// Command name
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Exit code
    pub exit_code: i32,

    /// Duration in milliseconds
    pub duration_ms: u64,

    /// Success flag
    pub ok: bool,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    /// Discover log file path with fallback chain
    ///
    /// Priority:
    /// 1. $BENCHENV_LOG_FILE environment variable (explicit override)
    /// 2. $XDG_STATE_HOME/benchenv/ctl.jsonl (XDG standard)
    /// 3. ~/.local/state/benchenv/ctl.jsonl (XDG fallback)
    pub fn discover_log_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("BENCHENV_LOG_FILE") {
            return Some(PathBuf::from(path));
        }

        if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
            return Some(PathBuf::from(xdg_state).join("benchenv/ctl.jsonl"));
        }

        if let Ok(home) = std::env::var("HOME") {
            return Some(PathBuf::from(home).join(".local/state/benchenv/ctl.jsonl"));
        }

        None
    }

    /// Append the entry to the log file. Failures are reported to the caller,
    /// which is free to ignore them.
    pub fn write(&self) -> Result<(), std::io::Error> {
        match Self::discover_log_path() {
            Some(path) => self.write_to(&path),
            None => Ok(()),
        }
    }

    pub fn write_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    /// Generate request ID
    pub fn generate_req_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Get current timestamp in ISO 8601 format
    pub fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}
