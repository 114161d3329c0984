//! benchenv configuration
//!
//! Config file: ~/.config/benchenv/config.toml or /etc/benchenv/config.toml.
//! Every field is optional; an absent file means defaults.

use crate::error::{Error, Result};
use crate::host::{Host, Interrupt};
use crate::privilege::{is_root, Direct, Elevator, Sudo};
use crate::profile::ProfileTuning;
use crate::snapshot::{SnapshotStore, DEFAULT_SNAPSHOT_FILE};
use crate::sysfs::HostPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How privileged writes are performed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevationConfig {
    /// Helper program prefixed to privileged commands
    #[serde(default = "default_helper")]
    pub helper: String,

    /// Write directly instead of through the helper. Unset means direct
    /// only when already running as root.
    #[serde(default)]
    pub direct: Option<bool>,
}

fn default_helper() -> String {
    "sudo".to_string()
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            helper: default_helper(),
            direct: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default = "default_lab_max_cores")]
    pub max_cores: u32,
    #[serde(default = "default_lab_governor")]
    pub governor: String,
}

fn default_lab_max_cores() -> u32 {
    ProfileTuning::default().lab_max_cores
}

fn default_lab_governor() -> String {
    ProfileTuning::default().lab_governor
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            max_cores: default_lab_max_cores(),
            governor: default_lab_governor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// kHz
    #[serde(default = "default_min_freq_floor")]
    pub min_freq_floor: u64,
    #[serde(default = "default_production_governor")]
    pub governor: String,
}

fn default_min_freq_floor() -> u64 {
    ProfileTuning::default().production_min_freq_floor
}

fn default_production_governor() -> String {
    ProfileTuning::default().production_governor
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            min_freq_floor: default_min_freq_floor(),
            governor: default_production_governor(),
        }
    }
}

/// Main benchenv configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchenvConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default)]
    pub elevation: ElevationConfig,

    #[serde(default)]
    pub paths: HostPaths,

    #[serde(default)]
    pub lab: LabConfig,

    #[serde(default)]
    pub production: ProductionConfig,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_FILE)
}

impl Default for BenchenvConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            elevation: ElevationConfig::default(),
            paths: HostPaths::default(),
            lab: LabConfig::default(),
            production: ProductionConfig::default(),
        }
    }
}

impl BenchenvConfig {
    /// ~/.config/benchenv/config.toml, honouring $XDG_CONFIG_HOME
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Some(Path::new(&xdg).join("benchenv").join("config.toml"));
        }
        std::env::var("HOME")
            .ok()
            .map(|home| Path::new(&home).join(".config/benchenv/config.toml"))
    }

    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/benchenv/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config
    /// 3. System config
    /// 4. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("loading configuration from {}", path.display());
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
        toml::from_str(&contents).map_err(|e| {
            Error::InvalidValue(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn tuning(&self) -> ProfileTuning {
        ProfileTuning {
            production_governor: self.production.governor.clone(),
            production_min_freq_floor: self.production.min_freq_floor,
            lab_governor: self.lab.governor.clone(),
            lab_max_cores: self.lab.max_cores,
        }
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.snapshot_path)
    }

    pub fn elevator(&self) -> Box<dyn Elevator> {
        if self.elevation.direct.unwrap_or_else(is_root) {
            Box::new(Direct)
        } else {
            Box::new(Sudo::new(&self.elevation.helper))
        }
    }

    pub fn host(&self, interrupt: Interrupt) -> Host {
        Host::new(self.paths.clone(), self.elevator()).with_interrupt(interrupt)
    }
}
