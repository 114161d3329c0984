//! CPU enumeration from the kernel's present/online/offline/possible lists

use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::sysfs;
use std::str::FromStr;

/// Which kernel CPU list to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuListMode {
    Present,
    Online,
    Offline,
    Possible,
}

impl CpuListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuListMode::Present => "present",
            CpuListMode::Online => "online",
            CpuListMode::Offline => "offline",
            CpuListMode::Possible => "possible",
        }
    }
}

impl FromStr for CpuListMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(CpuListMode::Present),
            "online" => Ok(CpuListMode::Online),
            "offline" => Ok(CpuListMode::Offline),
            "possible" => Ok(CpuListMode::Possible),
            other => Err(Error::InvalidValue(format!(
                "can only get online, offline, present, possible CPUs (got {:?})",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CpuListMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fresh handles for every CPU in the list. One missing CPU fails the whole
/// enumeration.
pub fn list_cpus(host: &Host, mode: CpuListMode) -> Result<Vec<Cpu<'_>>> {
    let path = host.paths().cpu_root.join(mode.as_str());
    let content = sysfs::read_value(&path)?;
    sysfs::parse_cpu_list(&content)?
        .into_iter()
        .map(|index| Cpu::new(host, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::Direct;
    use crate::sysfs::HostPaths;
    use std::fs;
    use tempfile::TempDir;

    fn host(dir: &TempDir, cpus: &[u32]) -> Host {
        let paths = HostPaths::under(dir.path());
        for index in cpus {
            fs::create_dir_all(paths.cpu_root.join(format!("cpu{}", index))).unwrap();
        }
        Host::new(paths, Box::new(Direct))
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("online".parse::<CpuListMode>().unwrap(), CpuListMode::Online);
        assert_eq!(
            "possible".parse::<CpuListMode>().unwrap(),
            CpuListMode::Possible
        );
        assert!(matches!(
            "isolated".parse::<CpuListMode>(),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_list_present() {
        let dir = TempDir::new().unwrap();
        let host = host(&dir, &[0, 1, 2, 3, 5, 7, 8]);
        fs::write(host.paths().cpu_root.join("present"), "0-3,5,7-8\n").unwrap();

        let indices: Vec<u32> = list_cpus(&host, CpuListMode::Present)
            .unwrap()
            .iter()
            .map(Cpu::index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 5, 7, 8]);
    }

    #[test]
    fn test_empty_list() {
        let dir = TempDir::new().unwrap();
        let host = host(&dir, &[0]);
        fs::write(host.paths().cpu_root.join("offline"), "\n").unwrap();
        assert!(list_cpus(&host, CpuListMode::Offline).unwrap().is_empty());
    }

    #[test]
    fn test_enumeration_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let host = host(&dir, &[0, 1]);
        fs::write(host.paths().cpu_root.join("online"), "0-2").unwrap();
        assert!(matches!(
            list_cpus(&host, CpuListMode::Online),
            Err(Error::NotFound(_))
        ));
    }
}
