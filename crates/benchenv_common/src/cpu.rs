//! Logical CPU handle
//!
//! Each accessor reads or writes sysfs on every call; nothing is cached, so
//! values observed through a handle are always live.

use crate::error::{Error, Result};
use crate::host::Host;
use crate::sysfs;
use std::path::PathBuf;
use tracing::info;

/// One logical CPU under /sys/devices/system/cpu/cpuN
pub struct Cpu<'h> {
    index: u32,
    dir: PathBuf,
    host: &'h Host,
}

impl std::fmt::Debug for Cpu<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("index", &self.index)
            .field("dir", &self.dir)
            .finish()
    }
}

impl<'h> Cpu<'h> {
    /// Fails with [`Error::NotFound`] if the kernel has no such CPU.
    pub fn new(host: &'h Host, index: u32) -> Result<Self> {
        let dir = host.paths().cpu_root.join(format!("cpu{}", index));
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("CPU {}", index)));
        }
        Ok(Self { index, dir, host })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    fn cpufreq(&self, name: &str) -> PathBuf {
        self.dir.join("cpufreq").join(name)
    }

    /// Online state. CPUs without an `online` control (the boot CPU) are
    /// always online.
    pub fn enabled(&self) -> Result<bool> {
        let path = self.dir.join("online");
        if !path.exists() {
            return Ok(true);
        }
        Ok(sysfs::read_value(&path)? == "1")
    }

    /// Bring the CPU online or offline. CPU 0 is never touched.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if self.index == 0 {
            return Ok(());
        }
        info!(
            "{} CPU {}",
            if enabled { "enabling" } else { "disabling" },
            self.index
        );
        self.host
            .elevator()
            .write(if enabled { "1" } else { "0" }, &self.dir.join("online"))
    }

    /// True when this CPU shares a core with a lower-numbered sibling.
    pub fn hyperthread(&self) -> bool {
        let path = self.dir.join("topology/thread_siblings_list");
        match sysfs::read_value(&path) {
            Ok(list) => is_secondary_sibling(self.index, &list),
            Err(_) => false,
        }
    }

    pub fn governor(&self) -> Result<String> {
        sysfs::read_value(&self.cpufreq("scaling_governor"))
    }

    pub fn available_governors(&self) -> Result<Vec<String>> {
        let list = sysfs::read_value(&self.cpufreq("scaling_available_governors"))?;
        Ok(list.split_whitespace().map(str::to_string).collect())
    }

    /// Fails with [`Error::InvalidValue`] unless the kernel offers `governor`.
    pub fn set_governor(&self, governor: &str) -> Result<()> {
        if !self.available_governors()?.iter().any(|g| g == governor) {
            return Err(Error::InvalidValue(format!(
                "governor '{}' not available on CPU {}",
                governor, self.index
            )));
        }
        info!("CPU {} governor -> {}", self.index, governor);
        self.host
            .elevator()
            .write(governor, &self.cpufreq("scaling_governor"))
    }

    pub fn min_hw_freq(&self) -> Result<u64> {
        sysfs::read_u64(&self.cpufreq("cpuinfo_min_freq"))
    }

    pub fn max_hw_freq(&self) -> Result<u64> {
        sysfs::read_u64(&self.cpufreq("cpuinfo_max_freq"))
    }

    pub fn min_freq(&self) -> Result<u64> {
        sysfs::read_u64(&self.cpufreq("scaling_min_freq"))
    }

    pub fn max_freq(&self) -> Result<u64> {
        sysfs::read_u64(&self.cpufreq("scaling_max_freq"))
    }

    pub fn set_min_freq(&self, value: u64) -> Result<()> {
        self.set_freq_limit("scaling_min_freq", value)
    }

    pub fn set_max_freq(&self, value: u64) -> Result<()> {
        self.set_freq_limit("scaling_max_freq", value)
    }

    fn set_freq_limit(&self, name: &str, value: u64) -> Result<()> {
        // Hardware bounds are re-read on every call
        let min = self.min_hw_freq()?;
        let max = self.max_hw_freq()?;
        if value < min || value > max {
            return Err(Error::OutOfRange { value, min, max });
        }
        info!("CPU {} {} -> {}", self.index, name, value);
        self.host
            .elevator()
            .write(&value.to_string(), &self.cpufreq(name))
    }
}

/// Decide from a `thread_siblings_list` value whether `index` is a
/// non-primary member of its group.
pub fn is_secondary_sibling(index: u32, siblings: &str) -> bool {
    let mut group = match sysfs::parse_cpu_list(siblings) {
        Ok(group) => group,
        Err(_) => return false,
    };
    group.sort_unstable();
    if group.len() < 2 {
        return false;
    }
    group[1..].contains(&index)
}
