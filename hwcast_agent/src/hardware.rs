//! Hardware collaborator: one blocking call per category. The sampler owns
//! degradation policy; implementations just report what they could read.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use once_cell::sync::Lazy;

use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System,
    MINIMUM_CPU_UPDATE_INTERVAL,
};
use tracing::{debug, info};

use crate::error::CollectError;
use crate::gpu::{GpuProbe, GpuReading};
use crate::types::SystemInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct CpuReading {
    pub utilization_percent: f32,
    pub per_core: Vec<f32>,
    pub frequency_mhz: u64,
    pub load_average: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveReading {
    pub device: String,
    pub filesystem: String,
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MountPoint {
    pub path: String,
    pub device: String,
    pub filesystem: String,
}

/// Blocking hardware access. Called from the blocking pool, never from an async task directly.
pub trait HardwareSource: Send + Sync + 'static {
    fn system_info(&self) -> SystemInfo;
    fn uptime_seconds(&self) -> u64;
    fn cpu_info(&self) -> Result<CpuReading, CollectError>;
    fn cpu_temperature(&self) -> Result<f32, CollectError>;
    fn memory_info(&self) -> Result<MemoryReading, CollectError>;
    /// One entry per requested path, in request order.
    fn disk_info(&self, drives: &[String]) -> Vec<(String, Result<DriveReading, CollectError>)>;
    fn available_drives(&self) -> Result<Vec<MountPoint>, CollectError>;
    fn gpu_info(&self) -> Result<Vec<GpuReading>, CollectError>;
    fn gpu_present(&self) -> bool;
}

// Pseudo filesystems that never make sense as a "drive".
static VIRTUAL_FS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "proc", "sysfs", "devtmpfs", "devpts", "tmpfs", "cgroup", "cgroup2", "overlay",
        "squashfs", "autofs", "debugfs", "tracefs", "securityfs", "pstore", "bpf", "mqueue",
        "hugetlbfs",
    ]
    .into_iter()
    .collect()
});

fn is_real_drive(path: &str, fs: &str, total: u64) -> bool {
    if total == 0 || VIRTUAL_FS.contains(fs) {
        return false;
    }
    !(path.starts_with("/proc") || path.starts_with("/sys") || path.starts_with("/dev"))
}

/// sysinfo for CPU/RAM/disks/sensors, NVML for GPUs.
pub struct SysinfoSource {
    sys: Mutex<System>,
    // When usage deltas were last taken; sysinfo ignores refreshes closer than
    // MINIMUM_CPU_UPDATE_INTERVAL and hands back the previous figures.
    cpu_refreshed: Mutex<Instant>,
    disks: Mutex<Disks>,
    components: Mutex<Components>,
    gpus: GpuProbe,
    info: SystemInfo,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        let mut sys = System::new_with_specifics(refresh_kind);
        // Baseline for CPU usage deltas; the first real sample is one tick later.
        sys.refresh_cpu_all();
        sys.refresh_memory();
        let cpu_refreshed = Instant::now();

        let info = SystemInfo {
            hostname: hostname::get()
                .ok()
                .and_then(|s| s.into_string().ok())
                .or_else(System::host_name)
                .unwrap_or_else(|| "unknown".into()),
            os: System::long_os_version().unwrap_or_else(|| std::env::consts::OS.to_string()),
            cpu_brand: sys
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| "Unknown CPU".into()),
            cores_physical: System::physical_core_count(),
            cores_logical: sys.cpus().len(),
            total_ram_bytes: sys.total_memory(),
        };
        info!(
            cpu = %info.cpu_brand,
            os = %info.os,
            cores = info.cores_logical,
            "hardware source initialized"
        );

        Self {
            sys: Mutex::new(sys),
            cpu_refreshed: Mutex::new(cpu_refreshed),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
            gpus: GpuProbe::init(),
            info,
        }
    }

    fn sys(&self) -> Result<MutexGuard<'_, System>, CollectError> {
        self.sys
            .lock()
            .map_err(|_| CollectError::other("system handle poisoned"))
    }

    /// Refresh CPU usage, first blocking until the previous refresh is at
    /// least MINIMUM_CPU_UPDATE_INTERVAL old. Runs on the blocking pool.
    fn refresh_cpu(&self, sys: &mut System) -> Result<(), CollectError> {
        let mut last = self
            .cpu_refreshed
            .lock()
            .map_err(|_| CollectError::other("cpu refresh clock poisoned"))?;
        let since = last.elapsed();
        if since < MINIMUM_CPU_UPDATE_INTERVAL {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - since);
        }
        sys.refresh_cpu_all();
        *last = Instant::now();
        Ok(())
    }

    fn disks(&self) -> Result<MutexGuard<'_, Disks>, CollectError> {
        let mut disks = self
            .disks
            .lock()
            .map_err(|_| CollectError::other("disk handle poisoned"))?;
        disks.refresh(true);
        Ok(disks)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareSource for SysinfoSource {
    fn system_info(&self) -> SystemInfo {
        self.info.clone()
    }

    fn uptime_seconds(&self) -> u64 {
        System::uptime()
    }

    fn cpu_info(&self) -> Result<CpuReading, CollectError> {
        let mut sys = self.sys()?;
        self.refresh_cpu(&mut sys)?;
        let cpus = sys.cpus();
        if cpus.is_empty() {
            return Err(CollectError::Unavailable("cpu"));
        }
        let per_core: Vec<f32> = cpus.iter().map(|c| c.cpu_usage()).collect();
        let freq_sum: u64 = cpus.iter().map(|c| c.frequency()).sum();
        let load = System::load_average();
        // Windows reports all zeros; treat that as "not supported".
        let load_average = if cfg!(windows) {
            None
        } else {
            Some([load.one, load.five, load.fifteen])
        };
        Ok(CpuReading {
            utilization_percent: sys.global_cpu_usage(),
            frequency_mhz: freq_sum / cpus.len() as u64,
            per_core,
            load_average,
        })
    }

    fn cpu_temperature(&self) -> Result<f32, CollectError> {
        let mut components = self
            .components
            .lock()
            .map_err(|_| CollectError::other("sensor handle poisoned"))?;
        components.refresh(false);
        components
            .iter()
            .filter(|c| {
                let l = c.label().to_ascii_lowercase();
                l.contains("cpu") || l.contains("package") || l.contains("tctl") || l.contains("tdie")
            })
            .filter_map(|c| c.temperature())
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or(CollectError::Unavailable("cpu temperature"))
    }

    fn memory_info(&self) -> Result<MemoryReading, CollectError> {
        let mut sys = self.sys()?;
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(CollectError::Unavailable("memory"));
        }
        let available = sys.available_memory();
        Ok(MemoryReading {
            total,
            used: total.saturating_sub(available),
            available,
            swap_total: sys.total_swap(),
            swap_used: sys.used_swap(),
        })
    }

    fn disk_info(&self, drives: &[String]) -> Vec<(String, Result<DriveReading, CollectError>)> {
        let disks = match self.disks() {
            Ok(d) => d,
            Err(e) => return drives.iter().map(|p| (p.clone(), Err(e.clone()))).collect(),
        };
        drives
            .iter()
            .map(|path| {
                let found = disks
                    .list()
                    .iter()
                    .find(|d| d.mount_point().to_string_lossy() == path.as_str())
                    .map(|d| DriveReading {
                        device: d.name().to_string_lossy().into_owned(),
                        filesystem: d.file_system().to_string_lossy().into_owned(),
                        total: d.total_space(),
                        available: d.available_space(),
                    })
                    .ok_or_else(|| CollectError::DriveNotFound(path.clone()));
                (path.clone(), found)
            })
            .collect()
    }

    fn available_drives(&self) -> Result<Vec<MountPoint>, CollectError> {
        let disks = self.disks()?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for d in disks.list() {
            let path = d.mount_point().to_string_lossy().into_owned();
            let fs = d.file_system().to_string_lossy().into_owned();
            if !is_real_drive(&path, &fs, d.total_space()) {
                debug!(%path, %fs, "skipping pseudo filesystem");
                continue;
            }
            if seen.insert(path.clone()) {
                out.push(MountPoint {
                    path,
                    device: d.name().to_string_lossy().into_owned(),
                    filesystem: fs,
                });
            }
        }
        Ok(out)
    }

    fn gpu_info(&self) -> Result<Vec<GpuReading>, CollectError> {
        self.gpus.collect()
    }

    fn gpu_present(&self) -> bool {
        self.gpus.is_available()
    }
}
