//! Test doubles for the hardware collaborator and subscriber channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use crate::config::{BroadcastSettings, MonitoringConfig, ServerConfig};
use crate::error::{CollectError, PushError};
use crate::gpu::{GpuReading, VramReading};
use crate::hardware::{CpuReading, DriveReading, HardwareSource, MemoryReading, MountPoint};
use crate::registry::PushChannel;
use crate::state::AppState;
use crate::types::SystemInfo;

/// Agent state over a healthy fake source with default settings.
pub fn state() -> AppState {
    state_with(FakeSource::healthy(), MonitoringConfig::default())
}

pub fn state_with(source: FakeSource, monitoring: MonitoringConfig) -> AppState {
    let settings = BroadcastSettings {
        push_timeout: Duration::from_millis(100),
        ..BroadcastSettings::default()
    };
    AppState::new(Arc::new(source), monitoring, settings, ServerConfig::default())
}

#[derive(Clone)]
pub struct FakeSource {
    pub fail_memory: bool,
    pub missing_drive: Option<String>,
    /// `None` means no GPU stack at all.
    pub gpus: Option<u32>,
    pub panic: bool,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn healthy() -> Self {
        Self {
            fail_memory: false,
            missing_drive: None,
            gpus: Some(2),
            panic: false,
            delay: None,
        }
    }

    fn gate(&self) {
        if self.panic {
            panic!("driver exploded");
        }
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
    }
}

impl HardwareSource for FakeSource {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            hostname: "testbox".into(),
            os: "TestOS 1.0".into(),
            cpu_brand: "Fake CPU".into(),
            cores_physical: Some(2),
            cores_logical: 4,
            total_ram_bytes: 8 << 30,
        }
    }

    fn uptime_seconds(&self) -> u64 {
        42
    }

    fn cpu_info(&self) -> Result<CpuReading, CollectError> {
        self.gate();
        Ok(CpuReading {
            utilization_percent: 12.5,
            per_core: vec![10.0, 20.0, 5.0, 15.0],
            frequency_mhz: 3200,
            load_average: Some([0.5, 0.4, 0.3]),
        })
    }

    fn cpu_temperature(&self) -> Result<f32, CollectError> {
        Ok(55.0)
    }

    fn memory_info(&self) -> Result<MemoryReading, CollectError> {
        if self.fail_memory {
            return Err(CollectError::other("meminfo unreadable"));
        }
        Ok(MemoryReading {
            total: 8 << 30,
            used: 2 << 30,
            available: 6 << 30,
            swap_total: 1 << 30,
            swap_used: 0,
        })
    }

    fn disk_info(&self, drives: &[String]) -> Vec<(String, Result<DriveReading, CollectError>)> {
        drives
            .iter()
            .map(|p| {
                let r = if self.missing_drive.as_deref() == Some(p.as_str()) {
                    Err(CollectError::DriveNotFound(p.clone()))
                } else {
                    Ok(DriveReading {
                        device: "/dev/fake".into(),
                        filesystem: "ext4".into(),
                        total: 100 << 30,
                        available: 60 << 30,
                    })
                };
                (p.clone(), r)
            })
            .collect()
    }

    fn available_drives(&self) -> Result<Vec<MountPoint>, CollectError> {
        Ok(["/", "/data"]
            .iter()
            .map(|p| MountPoint {
                path: (*p).into(),
                device: "/dev/fake".into(),
                filesystem: "ext4".into(),
            })
            .collect())
    }

    fn gpu_info(&self) -> Result<Vec<GpuReading>, CollectError> {
        let count = self.gpus.ok_or(CollectError::Unavailable("gpu"))?;
        Ok((0..count)
            .map(|index| GpuReading {
                index,
                name: format!("Fake GPU {index}"),
                utilization: Ok(30 + index),
                vram: Ok(VramReading {
                    total: 8 << 30,
                    used: 1 << 30,
                }),
                temperature: Ok(60),
            })
            .collect())
    }

    fn gpu_present(&self) -> bool {
        self.gpus.is_some_and(|n| n > 0)
    }
}

/// Records every frame it receives; can be told to fail or hang.
#[derive(Default)]
pub struct RecordingChannel {
    pub frames: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    pub hang: AtomicBool,
}

impl RecordingChannel {
    pub fn failing() -> Arc<Self> {
        let ch = Self::default();
        ch.fail.store(true, Ordering::SeqCst);
        Arc::new(ch)
    }

    pub fn hanging() -> Arc<Self> {
        let ch = Self::default();
        ch.hang.store(true, Ordering::SeqCst);
        Arc::new(ch)
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

impl PushChannel for RecordingChannel {
    fn push(&self, frame: Arc<str>) -> BoxFuture<'_, Result<(), PushError>> {
        Box::pin(async move {
            if self.hang.load(Ordering::SeqCst) {
                futures::future::pending::<()>().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(PushError::Closed);
            }
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        })
    }
}
