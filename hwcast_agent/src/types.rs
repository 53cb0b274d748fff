//! Snapshot schema served over HTTP and pushed over WebSocket.
//! Keep this module stable: it defines the wire format. Every category is
//! always present; disabled or failed readings use the `-1` sentinel.

use serde::{Deserialize, Serialize};

/// Stand-in for a reading that is disabled or could not be collected.
pub const SENTINEL: i64 = -1;
pub const SENTINEL_F: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds; never lower than the previous snapshot's.
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub monitoring_status: MonitoringStatus,
    pub system: SystemInfo,
    pub cpu: CpuStatus,
    pub ram: RamStatus,
    pub disk: DiskStatus,
    pub gpu: GpuStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringStatus {
    pub hardware_available: bool,
    pub gpu_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
    pub cpu_brand: String,
    pub cores_physical: Option<usize>,
    pub cores_logical: usize,
    pub total_ram_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStatus {
    pub enabled: bool,
    pub utilization_percent: f64,
    pub per_core: Vec<f64>,
    pub frequency_mhz: i64,
    pub load_average: Option<[f64; 3]>,
    /// Package temperature in celsius; sentinel when temperatures are off or no sensor exists.
    pub temperature_c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CpuStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            utilization_percent: SENTINEL_F,
            per_core: Vec::new(),
            frequency_mhz: SENTINEL,
            load_average: None,
            temperature_c: SENTINEL_F,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            enabled: true,
            error: Some(error),
            ..Self::disabled()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapStatus {
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamStatus {
    pub enabled: bool,
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub available_bytes: i64,
    pub used_percent: f64,
    pub swap: SwapStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RamStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            total_bytes: SENTINEL,
            used_bytes: SENTINEL,
            available_bytes: SENTINEL,
            used_percent: SENTINEL_F,
            swap: SwapStatus {
                total_bytes: SENTINEL,
                used_bytes: SENTINEL,
                used_percent: SENTINEL_F,
            },
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            enabled: true,
            error: Some(error),
            ..Self::disabled()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveStatus {
    pub path: String,
    pub device: Option<String>,
    pub filesystem: Option<String>,
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub free_bytes: i64,
    pub used_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DriveStatus {
    pub fn failed(path: String, error: String) -> Self {
        Self {
            path,
            device: None,
            filesystem: None,
            total_bytes: SENTINEL,
            used_bytes: SENTINEL,
            free_bytes: SENTINEL,
            used_percent: SENTINEL_F,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskTotals {
    pub total_bytes: i64,
    pub used_bytes: i64,
    pub free_bytes: i64,
    pub used_percent: f64,
}

impl DiskTotals {
    pub fn unavailable() -> Self {
        Self {
            total_bytes: SENTINEL,
            used_bytes: SENTINEL,
            free_bytes: SENTINEL,
            used_percent: SENTINEL_F,
        }
    }

    /// Sums the drives that were read successfully.
    pub fn from_drives(drives: &[DriveStatus]) -> Self {
        let ok = drives.iter().filter(|d| d.error.is_none());
        let (mut total, mut used, mut free) = (0i64, 0i64, 0i64);
        for d in ok {
            total = total.saturating_add(d.total_bytes);
            used = used.saturating_add(d.used_bytes);
            free = free.saturating_add(d.free_bytes);
        }
        Self {
            total_bytes: total,
            used_bytes: used,
            free_bytes: free,
            used_percent: percent(used as f64, total as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskStatus {
    pub enabled: bool,
    pub drives: Vec<DriveStatus>,
    pub total: DiskTotals,
    pub monitored_drives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiskStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            drives: Vec::new(),
            total: DiskTotals::unavailable(),
            monitored_drives: Vec::new(),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            enabled: true,
            error: Some(error),
            ..Self::disabled()
        }
    }

    pub fn drive(&self, path: &str) -> Option<&DriveStatus> {
        self.drives.iter().find(|d| d.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuDevice {
    pub index: i64,
    pub name: String,
    pub gpu_utilization: f64,
    pub gpu_temperature: f64,
    pub vram_total: i64,
    pub vram_used: i64,
    pub vram_used_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuStatus {
    pub enabled: bool,
    pub vram_enabled: bool,
    pub temperature_enabled: bool,
    /// "cuda" when at least one NVIDIA device is readable, otherwise "cpu".
    pub device_type: String,
    pub gpu_count: usize,
    pub gpus: Vec<GpuDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GpuStatus {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            vram_enabled: false,
            temperature_enabled: false,
            device_type: "cpu".into(),
            gpu_count: 0,
            gpus: Vec::new(),
            error: None,
        }
    }

    pub fn failed(enabled: bool, vram: bool, temp: bool, error: String) -> Self {
        Self {
            enabled,
            vram_enabled: vram,
            temperature_enabled: temp,
            error: Some(error),
            ..Self::disabled()
        }
    }
}

/// Compact per-tick payload pushed to viewers inside `monitoring_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerData {
    pub cpu: ViewerCpu,
    pub memory: ViewerMemory,
    pub drives: Vec<ViewerDrive>,
    pub gpus: Vec<ViewerGpu>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerCpu {
    pub usage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerMemory {
    pub percent: f64,
    pub used: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerDrive {
    pub path: String,
    pub used_percent: f64,
    pub used_bytes: i64,
    pub total_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerGpu {
    pub name: String,
    pub gpu_utilization: f64,
    pub gpu_temperature: f64,
    pub vram_used_percent: f64,
    pub vram_used: i64,
    pub vram_total: i64,
}

impl From<&Snapshot> for ViewerData {
    fn from(s: &Snapshot) -> Self {
        ViewerData {
            cpu: ViewerCpu {
                usage: s.cpu.utilization_percent,
            },
            memory: ViewerMemory {
                percent: s.ram.used_percent,
                used: s.ram.used_bytes,
                total: s.ram.total_bytes,
            },
            drives: s
                .disk
                .drives
                .iter()
                .map(|d| ViewerDrive {
                    path: d.path.clone(),
                    used_percent: d.used_percent,
                    used_bytes: d.used_bytes,
                    total_bytes: d.total_bytes,
                })
                .collect(),
            gpus: s
                .gpu
                .gpus
                .iter()
                .map(|g| ViewerGpu {
                    name: g.name.clone(),
                    gpu_utilization: g.gpu_utilization,
                    gpu_temperature: g.gpu_temperature,
                    vram_used_percent: g.vram_used_percent,
                    vram_used: g.vram_used,
                    vram_total: g.vram_total,
                })
                .collect(),
        }
    }
}

/// `used / total * 100`, or 0 when `total` is not positive.
pub fn percent(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}

/// Saturating u64 -> i64 for byte counts that share a field with the sentinel.
pub fn bytes(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
