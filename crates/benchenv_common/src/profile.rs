//! Benchmarking profiles
//!
//! A profile is an ordered list of mutations applied to whatever state the
//! host is in. Profiles never look at the snapshot and are never stored.

use crate::error::{Error, Result};
use crate::host::{CpuVendor, Host, DROP_ALL_CACHES};
use crate::topology::{list_cpus, CpuListMode};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// 1 GHz in the kHz units used by cpufreq
pub const ONE_GHZ_KHZ: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Full ASLR, turbo on, swap on, every core at performance
    Production,
    /// Leave the host as it is
    Lightweight,
    /// Deterministic: no ASLR, no turbo, no swap, cold caches, four
    /// physical cores at their lowest clock
    Lab,
}

/// Knobs the profiles read. Defaults match the documented profiles.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProfileTuning {
    /// Governor for every core in the production profile
    pub production_governor: String,
    /// Lower bound for scaling_min_freq in the production profile (kHz)
    pub production_min_freq_floor: u64,
    /// Governor for the remaining cores in the lab profile
    pub lab_governor: String,
    /// Number of lowest-indexed CPUs the lab profile keeps online
    pub lab_max_cores: u32,
}

impl Default for ProfileTuning {
    fn default() -> Self {
        Self {
            production_governor: "performance".to_string(),
            production_min_freq_floor: ONE_GHZ_KHZ,
            lab_governor: "powersave".to_string(),
            lab_max_cores: 4,
        }
    }
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Production => "prod",
            Profile::Lightweight => "light",
            Profile::Lab => "lab",
        }
    }

    /// Run the profile's mutations in order, stopping at the first failure.
    pub fn apply(&self, host: &Host, tuning: &ProfileTuning) -> Result<()> {
        info!("entering {} environment", self.name());
        match self {
            Profile::Production => apply_production(host, tuning),
            Profile::Lightweight => Ok(()),
            Profile::Lab => apply_lab(host, tuning),
        }
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prod" | "production" => Ok(Profile::Production),
            "light" | "lightweight" => Ok(Profile::Lightweight),
            "lab" => Ok(Profile::Lab),
            other => Err(Error::InvalidValue(format!(
                "unknown environment {:?} (expected prod, light or lab)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn set_boost_best_effort(host: &Host, enable: bool) -> Result<()> {
    if host.cpu_vendor()? == CpuVendor::Intel {
        match host.set_intel_boost(enable) {
            Ok(()) => {}
            Err(e) if e.is_unsupported() => debug!("{}", e),
            Err(e) => warn!("could not change turbo boost: {}", e),
        }
    }
    Ok(())
}

fn apply_production(host: &Host, tuning: &ProfileTuning) -> Result<()> {
    host.set_aslr(2)?;
    set_boost_best_effort(host, true)?;
    host.set_swaps(true, None)?;

    for cpu in list_cpus(host, CpuListMode::Present)? {
        host.interrupt().check()?;
        cpu.set_enabled(true)?;
        cpu.set_governor(&tuning.production_governor)?;
        cpu.set_max_freq(cpu.max_hw_freq()?)?;
        cpu.set_min_freq(cpu.min_hw_freq()?.max(tuning.production_min_freq_floor))?;
    }
    Ok(())
}

fn apply_lab(host: &Host, tuning: &ProfileTuning) -> Result<()> {
    host.set_aslr(0)?;
    set_boost_best_effort(host, false)?;
    host.set_swaps(false, None)?;
    host.drop_caches(DROP_ALL_CACHES)?;

    for cpu in list_cpus(host, CpuListMode::Online)? {
        host.interrupt().check()?;
        if cpu.hyperthread() {
            cpu.set_enabled(false)?;
        }
    }

    // Offlining changes the online set, so enumerate again
    for cpu in list_cpus(host, CpuListMode::Online)? {
        host.interrupt().check()?;
        if cpu.index() >= tuning.lab_max_cores {
            cpu.set_enabled(false)?;
        }
    }

    for cpu in list_cpus(host, CpuListMode::Online)? {
        host.interrupt().check()?;
        let lowest = cpu.min_hw_freq()?;
        cpu.set_governor(&tuning.lab_governor)?;
        cpu.set_max_freq(lowest)?;
        cpu.set_min_freq(lowest)?;
    }
    Ok(())
}
