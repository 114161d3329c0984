//! Host-global controls
//!
//! ASLR, Intel turbo boost, swap devices and the page cache. Each control is
//! independent and checks its own preconditions.

use crate::error::{Error, Result};
use crate::privilege::Elevator;
use crate::sysfs::{self, HostPaths};
use std::fs;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// CPU vendor as reported by /proc/cpuinfo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
}

impl std::fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuVendor::Intel => write!(f, "intel"),
            CpuVendor::Amd => write!(f, "amd"),
        }
    }
}

/// Page cache drop modes accepted by /proc/sys/vm/drop_caches
pub const DROP_PAGE_CACHE: u8 = 1;
pub const DROP_ALL_CACHES: u8 = 3;

/// Shared flag set when the operator interrupts a run.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the run as interrupted
    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Interrupted`] once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// The machine being tuned: where its kernel interfaces live and how to
/// write to them.
pub struct Host {
    paths: HostPaths,
    elevator: Box<dyn Elevator>,
    sync_program: String,
    interrupt: Interrupt,
}

impl Host {
    pub fn new(paths: HostPaths, elevator: Box<dyn Elevator>) -> Self {
        Self {
            paths,
            elevator,
            sync_program: "sync".to_string(),
            interrupt: Interrupt::new(),
        }
    }

    /// Override the program run to flush filesystem buffers
    pub fn with_sync_program(mut self, program: impl Into<String>) -> Self {
        self.sync_program = program.into();
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub(crate) fn elevator(&self) -> &dyn Elevator {
        self.elevator.as_ref()
    }

    /// Current ASLR mode (0 disabled, 1 partial, 2 full)
    pub fn aslr(&self) -> Result<u8> {
        let path = self.paths.aslr();
        let value = sysfs::read_value(&path)?;
        value
            .parse()
            .map_err(|_| Error::InvalidValue(format!("unexpected ASLR mode {:?}", value)))
    }

    pub fn set_aslr(&self, mode: u8) -> Result<()> {
        if mode > 2 {
            return Err(Error::InvalidValue(format!("unsupported ASLR mode {}", mode)));
        }
        info!("setting ASLR mode to {}", mode);
        self.elevator.write(&mode.to_string(), &self.paths.aslr())
    }

    /// Detect the CPU vendor from /proc/cpuinfo
    pub fn cpu_vendor(&self) -> Result<CpuVendor> {
        let cpuinfo = sysfs::read_value(&self.paths.cpuinfo())?;
        if cpuinfo.contains("GenuineIntel") {
            Ok(CpuVendor::Intel)
        } else if cpuinfo.contains("AuthenticAMD") {
            Ok(CpuVendor::Amd)
        } else {
            Err(Error::UnknownVendor)
        }
    }

    /// Whether Intel turbo boost is on. `NotFound` when the platform has no
    /// intel_pstate control.
    pub fn intel_boost(&self) -> Result<bool> {
        let value = sysfs::read_value(&self.paths.no_turbo())?;
        Ok(value != "1")
    }

    /// Fails with [`Error::BoostUnsupported`] when the control is absent.
    pub fn set_intel_boost(&self, enable: bool) -> Result<()> {
        let path = self.paths.no_turbo();
        if !path.exists() {
            return Err(Error::BoostUnsupported(path));
        }
        info!("{} turbo boost", if enable { "enabling" } else { "disabling" });
        self.elevator.write(if enable { "0" } else { "1" }, &path)
    }

    /// Flush filesystem buffers, then drop the requested caches.
    pub fn drop_caches(&self, mode: u8) -> Result<()> {
        if !(DROP_PAGE_CACHE..=DROP_ALL_CACHES).contains(&mode) {
            return Err(Error::InvalidValue(format!(
                "unsupported drop_caches mode {}",
                mode
            )));
        }

        debug!("running {}", self.sync_program);
        let status = Command::new(&self.sync_program)
            .status()
            .map_err(|e| Error::SyncFailed(e.to_string()))?;
        if !status.success() {
            return Err(Error::SyncFailed(status.to_string()));
        }

        info!("dropping caches (mode {})", mode);
        self.elevator
            .write(&mode.to_string(), &self.paths.drop_caches())
    }

    /// Active swap devices, in /proc/swaps order
    pub fn swaps(&self) -> Result<Vec<String>> {
        let path = self.paths.swaps();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| Error::io("failed while getting swap", e))?;
        Ok(parse_swaps(&contents))
    }

    /// Toggle swap. `None` or an empty list means every swap area (`-a`).
    pub fn set_swaps(&self, enable: bool, devices: Option<&[String]>) -> Result<()> {
        let program = if enable { "swapon" } else { "swapoff" };
        let result = match devices {
            Some(devices) if !devices.is_empty() => devices.iter().try_for_each(|dev| {
                info!("{} {}", program, dev);
                self.elevator.run(program, &[dev.as_str()])
            }),
            _ => {
                info!("{} -a", program);
                self.elevator.run(program, &["-a"])
            }
        };
        result.map_err(|e| Error::Swap(Box::new(e)))
    }
}

/// Device paths from a /proc/swaps listing (header line skipped)
pub fn parse_swaps(contents: &str) -> Vec<String> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
