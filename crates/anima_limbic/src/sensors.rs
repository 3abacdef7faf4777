//! OS resource sampling behind a trait, so the somatic loop can be driven
//! by a static sampler in tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anima_core::ResourceSnapshot;
use sysinfo::{Disks, System};

pub trait Sampler: Send + Sync {
    /// Snapshot disk space for the filesystem containing `path`, plus RAM
    /// and CPU. Never fails; unavailable readings come back as zeros.
    fn sample(&self, path: &Path) -> ResourceSnapshot;
}

/// Live sampler over sysinfo. CPU usage needs two refreshes separated in
/// time; the heartbeat cadence provides that for free.
pub struct SysinfoSampler {
    sys: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SysinfoSampler {
    fn sample(&self, path: &Path) -> ResourceSnapshot {
        let (ram_free, ram_total, cpu_util) = {
            let mut sys = self.sys.lock().expect("sampler mutex poisoned");
            sys.refresh_memory();
            sys.refresh_cpu_usage();
            let cpu = (sys.global_cpu_info().cpu_usage() as f64 / 100.0).clamp(0.0, 1.0);
            (sys.available_memory(), sys.total_memory(), cpu)
        };

        // Longest mount-point prefix wins.
        let disks = Disks::new_with_refreshed_list();
        let mut best: Option<(usize, u64, u64)> = None;
        for disk in disks.list() {
            let mount: PathBuf = disk.mount_point().to_path_buf();
            if path.starts_with(&mount) {
                let depth = mount.components().count();
                if best.map(|(d, _, _)| depth > d).unwrap_or(true) {
                    best = Some((depth, disk.available_space(), disk.total_space()));
                }
            }
        }
        let (disk_free, disk_total) = best.map(|(_, f, t)| (f, t)).unwrap_or((0, 0));

        ResourceSnapshot {
            disk_free,
            disk_total,
            ram_free,
            ram_total,
            cpu_util,
        }
    }
}

/// Fixed snapshot for tests and dry-runs.
#[derive(Debug, Clone, Copy)]
pub struct StaticSampler(pub ResourceSnapshot);

impl Sampler for StaticSampler {
    fn sample(&self, _path: &Path) -> ResourceSnapshot {
        self.0
    }
}
