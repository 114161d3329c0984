//! benchenv common - host state capture, benchmarking profiles and restore
//!
//! Reads and writes the Linux CPU/sysfs/proc surface: CPU online state,
//! cpufreq governor and limits, ASLR, Intel turbo boost, swap and caches.

pub mod config;
pub mod cpu;
pub mod error;
pub mod host;
pub mod privilege;
pub mod profile;
pub mod session;
pub mod snapshot;
pub mod sysfs;
pub mod topology;

pub use config::BenchenvConfig;
pub use cpu::Cpu;
pub use error::{Error, Result};
pub use host::{CpuVendor, Host, Interrupt};
pub use profile::{Profile, ProfileTuning};
pub use session::Session;
pub use snapshot::{CpuState, Snapshot, SnapshotStore};
pub use topology::{list_cpus, CpuListMode};
