//! Fake sysfs/procfs tree for driving the engine end to end

#![allow(dead_code)]

use benchenv_common::error::{Error, Result};
use benchenv_common::privilege::Elevator;
use benchenv_common::sysfs::{format_cpu_list, parse_cpu_list, HostPaths};
use benchenv_common::{Host, SnapshotStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const HW_MIN: u64 = 800_000;
pub const HW_MAX: u64 = 3_600_000;
pub const GOVERNORS: &str = "performance powersave schedutil";

const SWAPS_HEADER: &str = "Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority";

fn render_swaps(devices: &[String]) -> String {
    let mut out = String::from(SWAPS_HEADER);
    out.push('\n');
    for dev in devices {
        out.push_str(&format!("{}\t\tpartition\t8388604\t\t0\t\t-2\n", dev));
    }
    out
}

#[derive(Default)]
struct Shared {
    log: Vec<String>,
    refused: Vec<String>,
}

/// Elevator that edits the fake tree the way the kernel would.
pub struct FakeElevator {
    paths: HostPaths,
    fstab_swaps: Vec<String>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeElevator {
    fn refuse_if_listed(&self, target: &str) -> Result<()> {
        let shared = self.shared.lock().unwrap();
        if shared.refused.iter().any(|r| r == target) {
            return Err(Error::PermissionDenied {
                target: target.to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }

    fn refresh_online_lists(&self) -> Result<()> {
        let present = fs::read_to_string(self.paths.cpu_root.join("present")).unwrap();
        let mut online = Vec::new();
        let mut offline = Vec::new();
        for index in parse_cpu_list(&present)? {
            let path = self.paths.cpu_root.join(format!("cpu{}/online", index));
            let up = match fs::read_to_string(&path) {
                Ok(v) => v.trim() == "1",
                Err(_) => true,
            };
            if up {
                online.push(index);
            } else {
                offline.push(index);
            }
        }
        fs::write(self.paths.cpu_root.join("online"), format_cpu_list(&online)).unwrap();
        fs::write(self.paths.cpu_root.join("offline"), format_cpu_list(&offline)).unwrap();
        Ok(())
    }

    fn active_swaps(&self) -> Vec<String> {
        let listing = fs::read_to_string(self.paths.swaps()).unwrap_or_default();
        benchenv_common::host::parse_swaps(&listing)
    }
}

impl Elevator for FakeElevator {
    fn write(&self, value: &str, path: &Path) -> Result<()> {
        let target = path.display().to_string();
        self.shared
            .lock()
            .unwrap()
            .log
            .push(format!("write {} {}", target, value));
        self.refuse_if_listed(&target)?;

        fs::write(path, value).map_err(|e| Error::Io {
            context: format!("failed while writing {}", target),
            source: e,
        })?;

        if path.file_name().and_then(|n| n.to_str()) == Some("online") {
            self.refresh_online_lists()?;
        }
        Ok(())
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        let command = format!("{} {}", program, args.join(" "));
        self.shared.lock().unwrap().log.push(format!("run {}", command));
        self.refuse_if_listed(&command)?;

        let mut active = self.active_swaps();
        match (program, args) {
            ("swapoff", ["-a"]) => active.clear(),
            ("swapon", ["-a"]) => {
                for dev in &self.fstab_swaps {
                    if !active.contains(dev) {
                        active.push(dev.clone());
                    }
                }
            }
            ("swapon", [dev]) => {
                if !active.iter().any(|d| d == dev) {
                    active.push(dev.to_string());
                }
            }
            ("swapoff", [dev]) => active.retain(|d| d != dev),
            _ => {
                return Err(Error::PermissionDenied {
                    target: command,
                    status: "unknown command".to_string(),
                })
            }
        }
        fs::write(self.paths.swaps(), render_swaps(&active)).unwrap();
        Ok(())
    }
}

pub struct FakeCpu {
    pub index: u32,
    pub online: bool,
    pub siblings: Option<String>,
    pub governor: &'static str,
    pub min_freq: u64,
    pub max_freq: u64,
    pub hw_min: u64,
    pub hw_max: u64,
}

/// A machine with `cpus` logical CPUs where CPU i and i + cpus/2 share a core.
pub struct FakeMachine {
    dir: TempDir,
    pub paths: HostPaths,
    fstab_swaps: Vec<String>,
    shared: Arc<Mutex<Shared>>,
}

pub struct MachineSpec {
    pub vendor: &'static str,
    pub intel_pstate: bool,
    pub aslr: u8,
    pub cpus: Vec<FakeCpu>,
    pub active_swaps: Vec<String>,
    pub fstab_swaps: Vec<String>,
}

impl MachineSpec {
    pub fn smt(cpus: u32) -> Self {
        let half = cpus / 2;
        let cpus = (0..cpus)
            .map(|index| {
                let core = index % half;
                FakeCpu {
                    index,
                    online: true,
                    siblings: Some(format!("{},{}", core, core + half)),
                    governor: "schedutil",
                    min_freq: HW_MIN,
                    max_freq: HW_MAX,
                    hw_min: HW_MIN,
                    hw_max: HW_MAX,
                }
            })
            .collect();
        Self {
            vendor: "GenuineIntel",
            intel_pstate: true,
            aslr: 2,
            cpus,
            active_swaps: vec!["/dev/sda2".to_string()],
            fstab_swaps: vec!["/dev/sda2".to_string(), "/swapfile".to_string()],
        }
    }

    pub fn build(self) -> FakeMachine {
        let dir = TempDir::new().unwrap();
        let paths = HostPaths::under(&dir.path().join("host"));
        fs::create_dir_all(paths.proc_root.join("sys/kernel")).unwrap();
        fs::create_dir_all(paths.proc_root.join("sys/vm")).unwrap();
        fs::create_dir_all(&paths.cpu_root).unwrap();
        fs::create_dir_all(dir.path().join("state")).unwrap();

        fs::write(paths.aslr(), self.aslr.to_string()).unwrap();
        fs::write(
            paths.cpuinfo(),
            format!("processor\t: 0\nvendor_id\t: {}\n", self.vendor),
        )
        .unwrap();
        if self.intel_pstate {
            fs::create_dir_all(paths.cpu_root.join("intel_pstate")).unwrap();
            fs::write(paths.no_turbo(), "0").unwrap();
        }
        fs::write(paths.swaps(), render_swaps(&self.active_swaps)).unwrap();

        let mut present = Vec::new();
        let mut online = Vec::new();
        let mut offline = Vec::new();
        for cpu in &self.cpus {
            let base = paths.cpu_root.join(format!("cpu{}", cpu.index));
            let cpufreq = base.join("cpufreq");
            fs::create_dir_all(&cpufreq).unwrap();
            if cpu.index != 0 {
                fs::write(base.join("online"), if cpu.online { "1" } else { "0" }).unwrap();
            }
            if let Some(siblings) = &cpu.siblings {
                fs::create_dir_all(base.join("topology")).unwrap();
                fs::write(base.join("topology/thread_siblings_list"), siblings).unwrap();
            }
            fs::write(cpufreq.join("cpuinfo_min_freq"), cpu.hw_min.to_string()).unwrap();
            fs::write(cpufreq.join("cpuinfo_max_freq"), cpu.hw_max.to_string()).unwrap();
            fs::write(cpufreq.join("scaling_min_freq"), cpu.min_freq.to_string()).unwrap();
            fs::write(cpufreq.join("scaling_max_freq"), cpu.max_freq.to_string()).unwrap();
            fs::write(cpufreq.join("scaling_governor"), cpu.governor).unwrap();
            fs::write(cpufreq.join("scaling_available_governors"), GOVERNORS).unwrap();

            present.push(cpu.index);
            if cpu.online || cpu.index == 0 {
                online.push(cpu.index);
            } else {
                offline.push(cpu.index);
            }
        }
        let max = self.cpus.iter().map(|c| c.index).max().unwrap_or(0);
        fs::write(paths.cpu_root.join("present"), format_cpu_list(&present)).unwrap();
        fs::write(paths.cpu_root.join("possible"), format!("0-{}", max)).unwrap();
        fs::write(paths.cpu_root.join("online"), format_cpu_list(&online)).unwrap();
        fs::write(paths.cpu_root.join("offline"), format_cpu_list(&offline)).unwrap();

        FakeMachine {
            dir,
            paths,
            fstab_swaps: self.fstab_swaps,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }
}

impl FakeMachine {
    pub fn host(&self) -> Host {
        let elevator = FakeElevator {
            paths: self.paths.clone(),
            fstab_swaps: self.fstab_swaps.clone(),
            shared: Arc::clone(&self.shared),
        };
        Host::new(self.paths.clone(), Box::new(elevator)).with_sync_program("true")
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.dir.path().join("state/backup.json"))
    }

    pub fn cpu_file(&self, index: u32, name: &str) -> PathBuf {
        self.paths.cpu_root.join(format!("cpu{}", index)).join(name)
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap().trim().to_string()
    }

    /// Make every later write to `path` (or run of `command`) fail.
    pub fn refuse(&self, target: impl Into<String>) {
        self.shared.lock().unwrap().refused.push(target.into());
    }

    /// Every privileged write and command issued so far
    pub fn mutations(&self) -> Vec<String> {
        self.shared.lock().unwrap().log.clone()
    }

    /// Contents of every file in the fake tree except the write-only
    /// drop_caches trigger.
    pub fn observe(&self) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        collect(&self.dir.path().join("host"), &mut files);
        files.remove(&self.paths.drop_caches());
        files
    }
}

fn collect(dir: &Path, files: &mut BTreeMap<PathBuf, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(&path, files);
        } else {
            files.insert(path.clone(), fs::read_to_string(&path).unwrap());
        }
    }
}
