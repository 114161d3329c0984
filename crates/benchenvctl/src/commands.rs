//! Command implementations
//!
//! Each command is blocking; main runs them off the async runtime so SIGINT
//! can still be observed.

use crate::cli::{Cli, Commands, Environment};
use crate::errors::{EXIT_INTERRUPTED, EXIT_SUCCESS};
use crate::output;
use anyhow::{Context as _, Result};
use benchenv_common::session;
use benchenv_common::{
    list_cpus, BenchenvConfig, CpuListMode, Error, Host, Interrupt, Profile, ProfileTuning,
    Session, SnapshotStore,
};
use serde::Serialize;
use std::process::Command;
use tracing::{debug, warn};

/// Everything a command needs, resolved from configuration and flags
pub struct Context {
    pub host: Host,
    pub store: SnapshotStore,
    pub tuning: ProfileTuning,
}

impl Context {
    pub fn from_cli(cli: &Cli, interrupt: Interrupt) -> Result<Self> {
        let mut config =
            BenchenvConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
        if let Some(snapshot) = &cli.snapshot {
            config.snapshot_path = snapshot.clone();
        }
        debug!("configuration: {:?}", config);

        Ok(Self {
            host: config.host(interrupt),
            store: config.store(),
            tuning: config.tuning(),
        })
    }
}

/// Run the parsed command and return the process exit code.
pub fn execute(cli: &Cli, ctx: &Context) -> Result<i32> {
    match &cli.command {
        Commands::Enter { environment } => enter(ctx, *environment),
        Commands::Restore => restore(ctx),
        Commands::Run {
            environment,
            command,
        } => run(ctx, *environment, command),
        Commands::Status { json } => status(ctx, *json),
    }
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| "benchenvctl".to_string())
}

pub fn enter(ctx: &Context, environment: Environment) -> Result<i32> {
    let profile = Profile::from(environment);

    if ctx.store.exists() {
        output::warn("Backup file already exists. Overwriting.");
    }

    output::info(format!(
        "Recording original configuration to {}...",
        ctx.store.path().display()
    ));
    session::record(&ctx.host, &ctx.store).context("failed to record original configuration")?;

    output::info(format!("Entering {} environment...", profile));
    profile
        .apply(&ctx.host, &ctx.tuning)
        .with_context(|| format!("failed to enter {} environment", profile))?;

    output::ok(format!(
        "{} environment active.",
        output::capitalize(profile.name())
    ));
    output::info(format!("Run '{} restore' to revert changes.", program_name()));
    Ok(EXIT_SUCCESS)
}

pub fn restore(ctx: &Context) -> Result<i32> {
    if !ctx.store.exists() {
        return Err(Error::SnapshotMissing(ctx.store.path().to_path_buf()).into());
    }

    output::info(format!(
        "Restoring original configuration from {}...",
        ctx.store.path().display()
    ));
    session::restore(&ctx.host, &ctx.store)?;
    output::ok("Original configuration restored.");
    Ok(EXIT_SUCCESS)
}

pub fn run(ctx: &Context, environment: Environment, argv: &[String]) -> Result<i32> {
    let profile = Profile::from(environment);
    let (program, args) = argv
        .split_first()
        .context("no command given to run")?;

    output::info(format!("Entering {} environment...", profile));
    let session = Session::enter(&ctx.host, &ctx.store, profile, &ctx.tuning)
        .with_context(|| format!("failed to enter {} environment", profile))?;

    // From here on the session restores on every path, including `?`
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to execute {}", program))?;

    output::info(format!("Leaving {} environment...", profile));
    session.finish().context("failed to restore original configuration")?;
    output::ok("Original configuration restored.");

    Ok(child_exit_code(status))
}

fn child_exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => EXIT_INTERRUPTED,
    }
}

#[derive(Debug, Serialize)]
pub struct CpuStatus {
    pub index: u32,
    pub enabled: bool,
    pub hyperthread: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_freq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_freq: Option<u64>,
}

/// Read-only view of the host, for `status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub aslr: u8,
    pub vendor: Option<String>,
    pub intel_boost: Option<bool>,
    pub swaps: Vec<String>,
    pub snapshot: Option<String>,
    pub cpus: Vec<CpuStatus>,
}

impl StatusReport {
    /// Unlike a snapshot capture, an unknown vendor or an unreadable
    /// cpufreq value is reported as absent rather than failing.
    pub fn collect(ctx: &Context) -> Result<Self> {
        let host = &ctx.host;
        let vendor = match host.cpu_vendor() {
            Ok(vendor) => Some(vendor),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        let intel_boost = match vendor {
            Some(benchenv_common::CpuVendor::Intel) => host.intel_boost().ok(),
            _ => None,
        };

        let mut cpus = Vec::new();
        for cpu in list_cpus(host, CpuListMode::Present)? {
            let enabled = cpu.enabled()?;
            cpus.push(CpuStatus {
                index: cpu.index(),
                enabled,
                hyperthread: cpu.hyperthread(),
                governor: enabled.then(|| cpu.governor().ok()).flatten(),
                min_freq: enabled.then(|| cpu.min_freq().ok()).flatten(),
                max_freq: enabled.then(|| cpu.max_freq().ok()).flatten(),
            });
        }

        Ok(Self {
            aslr: host.aslr()?,
            vendor: vendor.map(|v| v.to_string()),
            intel_boost,
            swaps: host.swaps()?,
            snapshot: ctx
                .store
                .exists()
                .then(|| ctx.store.path().display().to_string()),
            cpus,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("ASLR          {}\n", self.aslr));
        out.push_str(&format!(
            "Vendor        {}\n",
            self.vendor.as_deref().unwrap_or("unknown")
        ));
        let boost = match self.intel_boost {
            Some(true) => "on",
            Some(false) => "off",
            None => "unsupported",
        };
        out.push_str(&format!("Turbo boost   {}\n", boost));
        let swaps = if self.swaps.is_empty() {
            "none".to_string()
        } else {
            self.swaps.join(", ")
        };
        out.push_str(&format!("Swap          {}\n", swaps));
        out.push_str(&format!(
            "Snapshot      {}\n",
            self.snapshot.as_deref().unwrap_or("none")
        ));
        out.push('\n');
        out.push_str("CPU  STATE    HT   GOVERNOR      MIN         MAX\n");
        for cpu in &self.cpus {
            out.push_str(&format!(
                "{:<4} {:<8} {:<4} {:<13} {:<11} {}\n",
                cpu.index,
                if cpu.enabled { "online" } else { "offline" },
                if cpu.hyperthread { "yes" } else { "no" },
                cpu.governor.as_deref().unwrap_or("-"),
                cpu.min_freq.map(output::format_khz).unwrap_or_else(|| "-".to_string()),
                cpu.max_freq.map(output::format_khz).unwrap_or_else(|| "-".to_string()),
            ));
        }
        out
    }
}

pub fn status(ctx: &Context, json: bool) -> Result<i32> {
    let report = StatusReport::collect(ctx)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(EXIT_SUCCESS)
}
