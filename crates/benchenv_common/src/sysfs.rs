//! Single-value pseudo-file access
//!
//! Everything under /sys and /proc that benchenv touches holds one short
//! line of text. Reads are unprivileged; privileged writes go through
//! [`crate::privilege::Elevator`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Roots of the kernel interfaces. Overridable so the whole engine can run
/// against a fake tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPaths {
    /// Usually /sys/devices/system/cpu
    #[serde(default = "default_cpu_root")]
    pub cpu_root: PathBuf,
    /// Usually /proc
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

fn default_cpu_root() -> PathBuf {
    PathBuf::from("/sys/devices/system/cpu")
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            cpu_root: default_cpu_root(),
            proc_root: default_proc_root(),
        }
    }
}

impl HostPaths {
    /// Both roots under one directory: `<base>/cpu` and `<base>/proc`.
    pub fn under(base: &Path) -> Self {
        Self {
            cpu_root: base.join("cpu"),
            proc_root: base.join("proc"),
        }
    }

    pub fn aslr(&self) -> PathBuf {
        self.proc_root.join("sys/kernel/randomize_va_space")
    }

    pub fn drop_caches(&self) -> PathBuf {
        self.proc_root.join("sys/vm/drop_caches")
    }

    pub fn swaps(&self) -> PathBuf {
        self.proc_root.join("swaps")
    }

    pub fn cpuinfo(&self) -> PathBuf {
        self.proc_root.join("cpuinfo")
    }

    pub fn no_turbo(&self) -> PathBuf {
        self.cpu_root.join("intel_pstate/no_turbo")
    }
}

/// Read a pseudo-file and return its trimmed contents.
pub fn read_value(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::NotFound(format!("file {}", path.display())));
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("failed while reading {}", path.display()), e))?;
    let value = raw.trim().to_string();
    debug!("read {} = {:?}", path.display(), value);
    Ok(value)
}

/// Read a pseudo-file holding a single unsigned integer.
pub fn read_u64(path: &Path) -> Result<u64> {
    let value = read_value(path)?;
    value.parse().map_err(|_| {
        Error::InvalidValue(format!(
            "{} holds {:?}, expected an integer",
            path.display(),
            value
        ))
    })
}

/// Unprivileged write. Fails with [`Error::Io`].
pub fn write_value(value: &str, path: &Path) -> Result<()> {
    debug!("write {} <- {:?}", path.display(), value);
    fs::write(path, value)
        .map_err(|e| Error::io(format!("failed while writing {}", path.display()), e))
}

/// Parse a kernel CPU list such as `0-3,5,7-8` into indices, in token order.
///
/// Empty input yields an empty list.
pub fn parse_cpu_list(list: &str) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for token in list.trim().split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, list)?;
                let end = parse_index(end, list)?;
                if end < start {
                    return Err(Error::InvalidValue(format!(
                        "descending CPU range {:?} in {:?}",
                        token, list
                    )));
                }
                indices.extend(start..=end);
            }
            None => indices.push(parse_index(token, list)?),
        }
    }
    Ok(indices)
}

fn parse_index(token: &str, list: &str) -> Result<u32> {
    token
        .trim()
        .parse()
        .map_err(|_| Error::InvalidValue(format!("bad CPU index {:?} in {:?}", token, list)))
}

/// Format indices back into the kernel's compact list syntax.
pub fn format_cpu_list(indices: &[u32]) -> String {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&(end + 1)) {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }
    parts.join(",")
}
