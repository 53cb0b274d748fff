//! Sampler: turns the hardware collaborator's per-category readings into one
//! immutable [`Snapshot`], degrading per category instead of failing whole.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{MonitoringConfig, SharedConfig};
use crate::error::{CollectError, SampleError};
use crate::hardware::{HardwareSource, MountPoint};
use crate::proto::unix_now;
use crate::types::{
    bytes, percent, CpuStatus, DiskStatus, DiskTotals, DriveStatus, GpuDevice, GpuStatus,
    MonitoringStatus, RamStatus, Snapshot, SwapStatus, SENTINEL, SENTINEL_F,
};

/// A category-level failure seen during one sample. `key` identifies the
/// condition for log suppression ("cpu", "drive:/mnt/x", "gpu0.temperature").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fault {
    pub key: String,
    pub error: CollectError,
}

#[derive(Default)]
struct Suppression {
    generation: u64,
    // (fault key, error kind); the message text is left out since it may vary per tick.
    seen: HashSet<(String, &'static str)>,
}

pub struct Sampler {
    source: Arc<dyn HardwareSource>,
    config: Arc<SharedConfig>,
    timeout: Duration,
    last_timestamp: Mutex<f64>,
    suppressed: Mutex<Suppression>,
}

impl Sampler {
    pub fn new(source: Arc<dyn HardwareSource>, config: Arc<SharedConfig>, timeout: Duration) -> Self {
        Self {
            source,
            config,
            timeout,
            last_timestamp: Mutex::new(0.0),
            suppressed: Mutex::new(Suppression::default()),
        }
    }

    pub fn source(&self) -> &Arc<dyn HardwareSource> {
        &self.source
    }

    /// Collect one snapshot using the configuration in effect right now.
    pub async fn sample(&self) -> Result<Snapshot, SampleError> {
        let (cfg, generation) = self.config.versioned().await;
        let source = Arc::clone(&self.source);
        let (mut snapshot, faults) = self
            .blocking(move || assemble(source.as_ref(), &cfg))
            .await?;
        self.report(generation, faults);
        snapshot.timestamp = self.next_timestamp();
        Ok(snapshot)
    }

    /// Mount points the OS currently reports, read on the blocking pool.
    pub async fn available_drives(&self) -> Result<Vec<MountPoint>, SampleError> {
        let source = Arc::clone(&self.source);
        self.blocking(move || source.available_drives().unwrap_or_default())
            .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SampleError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(SampleError::Timeout(self.timeout)),
            Ok(Err(e)) if e.is_panic() => Err(SampleError::Panicked(panic_message(e.into_panic()))),
            Ok(Err(e)) => Err(SampleError::Join(e.to_string())),
            Ok(Ok(v)) => Ok(v),
        }
    }

    /// Log each distinct fault once per configuration generation.
    fn report(&self, generation: u64, faults: Vec<Fault>) {
        let Ok(mut sup) = self.suppressed.lock() else {
            return;
        };
        if sup.generation != generation {
            sup.generation = generation;
            sup.seen.clear();
        }
        for fault in faults {
            if !sup.seen.insert((fault.key.clone(), fault.error.kind())) {
                continue;
            }
            match &fault.error {
                CollectError::Unavailable(_) => info!(key = %fault.key, "{}", fault.error),
                _ => warn!(key = %fault.key, "collection failed: {}", fault.error),
            }
        }
    }

    fn next_timestamp(&self) -> f64 {
        let now = unix_now();
        match self.last_timestamp.lock() {
            Ok(mut last) => {
                let ts = now.max(*last);
                *last = ts;
                ts
            }
            Err(_) => now,
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Build a snapshot (timestamp left at 0) plus every fault encountered.
pub fn assemble(source: &dyn HardwareSource, cfg: &MonitoringConfig) -> (Snapshot, Vec<Fault>) {
    let mut faults = Vec::new();
    let mut fault = |key: String, error: CollectError| {
        let msg = error.to_string();
        faults.push(Fault { key, error });
        msg
    };

    let cpu = if cfg.enable_cpu {
        match source.cpu_info() {
            Ok(r) => {
                let temperature_c = if cfg.enable_temperature {
                    match source.cpu_temperature() {
                        Ok(t) => f64::from(t),
                        Err(e) => {
                            fault("cpu.temperature".into(), e);
                            SENTINEL_F
                        }
                    }
                } else {
                    SENTINEL_F
                };
                CpuStatus {
                    enabled: true,
                    utilization_percent: f64::from(r.utilization_percent),
                    per_core: r.per_core.into_iter().map(f64::from).collect(),
                    frequency_mhz: i64::try_from(r.frequency_mhz).unwrap_or(SENTINEL),
                    load_average: r.load_average,
                    temperature_c,
                    error: None,
                }
            }
            Err(e) => CpuStatus::failed(fault("cpu".into(), e)),
        }
    } else {
        CpuStatus::disabled()
    };

    let ram = if cfg.enable_ram {
        match source.memory_info() {
            Ok(m) => RamStatus {
                enabled: true,
                total_bytes: bytes(m.total),
                used_bytes: bytes(m.used),
                available_bytes: bytes(m.available),
                used_percent: percent(m.used as f64, m.total as f64),
                swap: SwapStatus {
                    total_bytes: bytes(m.swap_total),
                    used_bytes: bytes(m.swap_used),
                    used_percent: percent(m.swap_used as f64, m.swap_total as f64),
                },
                error: None,
            },
            Err(e) => RamStatus::failed(fault("ram".into(), e)),
        }
    } else {
        RamStatus::disabled()
    };

    let disk = if cfg.enable_disk {
        disk_status(source, cfg, &mut fault)
    } else {
        DiskStatus::disabled()
    };

    let gpu = if cfg.wants_gpu() {
        gpu_status(source, cfg, &mut fault)
    } else {
        GpuStatus::disabled()
    };

    let snapshot = Snapshot {
        timestamp: 0.0,
        uptime_seconds: source.uptime_seconds(),
        monitoring_status: MonitoringStatus {
            hardware_available: cpu.error.is_none() || ram.error.is_none(),
            gpu_available: source.gpu_present(),
        },
        system: source.system_info(),
        cpu,
        ram,
        disk,
        gpu,
    };
    (snapshot, faults)
}

fn disk_status(
    source: &dyn HardwareSource,
    cfg: &MonitoringConfig,
    fault: &mut impl FnMut(String, CollectError) -> String,
) -> DiskStatus {
    let paths: Vec<String> = if cfg.selected_drives.is_empty() {
        match source.available_drives() {
            Ok(mounts) => mounts.into_iter().map(|m| m.path).collect(),
            Err(e) => return DiskStatus::failed(fault("disk".into(), e)),
        }
    } else {
        cfg.selected_drives.clone()
    };

    let drives: Vec<DriveStatus> = source
        .disk_info(&paths)
        .into_iter()
        .map(|(path, reading)| match reading {
            Ok(d) => {
                let used = d.total.saturating_sub(d.available);
                DriveStatus {
                    path,
                    device: Some(d.device),
                    filesystem: Some(d.filesystem),
                    total_bytes: bytes(d.total),
                    used_bytes: bytes(used),
                    free_bytes: bytes(d.available),
                    used_percent: percent(used as f64, d.total as f64),
                    error: None,
                }
            }
            Err(e) => {
                let msg = fault(format!("drive:{path}"), e);
                DriveStatus::failed(path, msg)
            }
        })
        .collect();

    DiskStatus {
        enabled: true,
        total: DiskTotals::from_drives(&drives),
        monitored_drives: paths,
        drives,
        error: None,
    }
}

fn gpu_status(
    source: &dyn HardwareSource,
    cfg: &MonitoringConfig,
    fault: &mut impl FnMut(String, CollectError) -> String,
) -> GpuStatus {
    let readings = match source.gpu_info() {
        Ok(r) => r,
        Err(e) => {
            let msg = fault("gpu".into(), e);
            return GpuStatus::failed(cfg.enable_gpu, cfg.enable_vram, cfg.enable_temperature, msg);
        }
    };

    let gpus: Vec<GpuDevice> = readings
        .into_iter()
        .filter(|r| cfg.gpu_selected(r.index))
        .map(|r| {
            let mut first_error: Option<String> = None;
            let mut note = |key: &str, e: CollectError| {
                let msg = fault(format!("gpu{}.{key}", r.index), e);
                first_error.get_or_insert(msg);
            };

            let gpu_utilization = match (cfg.enable_gpu, r.utilization) {
                (false, _) => SENTINEL_F,
                (true, Ok(v)) => f64::from(v),
                (true, Err(e)) => {
                    note("utilization", e);
                    SENTINEL_F
                }
            };
            let (vram_total, vram_used, vram_used_percent) = match (cfg.enable_vram, r.vram) {
                (false, _) => (SENTINEL, SENTINEL, SENTINEL_F),
                (true, Ok(v)) => (
                    bytes(v.total),
                    bytes(v.used),
                    percent(v.used as f64, v.total as f64),
                ),
                (true, Err(e)) => {
                    note("vram", e);
                    (SENTINEL, SENTINEL, SENTINEL_F)
                }
            };
            let gpu_temperature = match (cfg.enable_temperature, r.temperature) {
                (false, _) => SENTINEL_F,
                (true, Ok(v)) => f64::from(v),
                (true, Err(e)) => {
                    note("temperature", e);
                    SENTINEL_F
                }
            };

            GpuDevice {
                index: i64::from(r.index),
                name: r.name,
                gpu_utilization,
                gpu_temperature,
                vram_total,
                vram_used,
                vram_used_percent,
                error: first_error,
            }
        })
        .collect();

    debug!(count = gpus.len(), "gpu readings assembled");
    GpuStatus {
        enabled: cfg.enable_gpu,
        vram_enabled: cfg.enable_vram,
        temperature_enabled: cfg.enable_temperature,
        device_type: if gpus.is_empty() { "cpu" } else { "cuda" }.into(),
        gpu_count: gpus.len(),
        gpus,
        error: None,
    }
}
