//! Host snapshot: the pre-profile state needed to put the machine back
//!
//! Stored as JSON:
//! `{"aslr":2,"intel_boost":true,"cpus":{"0":{"enabled":true,...}},"swaps":[...]}`

use crate::error::{Error, Result};
use crate::host::{CpuVendor, Host};
use crate::sysfs::format_cpu_list;
use crate::topology::{list_cpus, CpuListMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default snapshot location, relative to the working directory
pub const DEFAULT_SNAPSHOT_FILE: &str = ".env_backup.json";

/// Recorded state of one CPU. Frequency settings are only kept for CPUs
/// that were online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_freq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_freq: Option<u64>,
}

impl CpuState {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            governor: None,
            max_freq: None,
            min_freq: None,
        }
    }

    pub fn enabled(governor: impl Into<String>, max_freq: u64, min_freq: u64) -> Self {
        Self {
            enabled: true,
            governor: Some(governor.into()),
            max_freq: Some(max_freq),
            min_freq: Some(min_freq),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub aslr: u8,
    /// None when the platform has no Intel turbo control
    pub intel_boost: Option<bool>,
    /// Keyed by CPU index, in numeric order
    pub cpus: BTreeMap<u32, CpuState>,
    pub swaps: Vec<String>,
}

impl Snapshot {
    /// Read the current host state. Nothing is written.
    pub fn capture(host: &Host) -> Result<Self> {
        let aslr = host.aslr()?;

        let intel_boost = match host.cpu_vendor()? {
            CpuVendor::Intel => match host.intel_boost() {
                Ok(boost) => Some(boost),
                Err(e) => {
                    debug!("turbo boost state unavailable: {}", e);
                    None
                }
            },
            CpuVendor::Amd => None,
        };

        let mut cpus = BTreeMap::new();
        for cpu in list_cpus(host, CpuListMode::Present)? {
            let state = if cpu.enabled()? {
                CpuState::enabled(cpu.governor()?, cpu.max_freq()?, cpu.min_freq()?)
            } else {
                CpuState::disabled()
            };
            cpus.insert(cpu.index(), state);
        }

        let snapshot = Self {
            aslr,
            intel_boost,
            cpus,
            swaps: host.swaps()?,
        };
        debug!(
            "captured {} CPUs, online {}",
            snapshot.cpus.len(),
            format_cpu_list(&snapshot.enabled_cpus())
        );
        Ok(snapshot)
    }

    /// Apply the recorded state to the host.
    ///
    /// Turbo boost is best-effort; every other field propagates its failure.
    /// CPUs that are present now but were not recorded are left alone.
    pub fn restore(&self, host: &Host) -> Result<()> {
        info!(
            "restoring snapshot: aslr {}, online CPUs {}, swaps [{}]",
            self.aslr,
            format_cpu_list(&self.enabled_cpus()),
            self.swaps.join(", ")
        );
        host.set_aslr(self.aslr)?;

        if let Some(boost) = self.intel_boost {
            if host.cpu_vendor()? == CpuVendor::Intel {
                match host.set_intel_boost(boost) {
                    Ok(()) => {}
                    Err(e) if e.is_unsupported() => debug!("{}", e),
                    Err(e) => warn!("could not restore turbo boost: {}", e),
                }
            }
        }

        for cpu in list_cpus(host, CpuListMode::Present)? {
            let Some(state) = self.cpus.get(&cpu.index()) else {
                debug!("CPU {} not in snapshot, leaving it alone", cpu.index());
                continue;
            };

            if state.enabled {
                let (governor, max_freq, min_freq) = match (
                    state.governor.as_deref(),
                    state.max_freq,
                    state.min_freq,
                ) {
                    (Some(g), Some(max), Some(min)) => (g, max, min),
                    _ => {
                        return Err(Error::InvalidValue(format!(
                            "snapshot entry for CPU {} lacks frequency settings",
                            cpu.index()
                        )))
                    }
                };
                // Governor first: some governors reject explicit limits
                cpu.set_enabled(true)?;
                cpu.set_governor(governor)?;
                cpu.set_max_freq(max_freq)?;
                cpu.set_min_freq(min_freq)?;
            } else {
                cpu.set_enabled(false)?;
            }
        }

        host.set_swaps(false, None)?;
        if !self.swaps.is_empty() {
            host.set_swaps(true, Some(&self.swaps))?;
        }

        Ok(())
    }

    /// Indices of the CPUs recorded as online
    pub fn enabled_cpus(&self) -> Vec<u32> {
        self.cpus
            .iter()
            .filter(|(_, state)| state.enabled)
            .map(|(index, _)| *index)
            .collect()
    }
}

/// The single on-disk snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the snapshot, replacing any existing one.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.exists() {
            debug!("overwriting existing snapshot {}", self.path.display());
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json).map_err(|e| {
            Error::io(
                format!("failed while writing snapshot {}", self.path.display()),
                e,
            )
        })?;
        info!("snapshot recorded to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Snapshot> {
        if !self.exists() {
            return Err(Error::SnapshotMissing(self.path.clone()));
        }
        let json = fs::read_to_string(&self.path).map_err(|e| {
            Error::io(
                format!("failed while reading snapshot {}", self.path.display()),
                e,
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| {
            Error::io(
                format!("failed while removing snapshot {}", self.path.display()),
                e,
            )
        })
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_FILE)
    }
}
