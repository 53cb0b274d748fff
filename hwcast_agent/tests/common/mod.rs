//! Shared helpers for agent integration tests: a deterministic hardware
//! source and an in-process server bound to an ephemeral port.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hwcast_agent::error::CollectError;
use hwcast_agent::gpu::{GpuReading, VramReading};
use hwcast_agent::hardware::{CpuReading, DriveReading, MemoryReading, MountPoint};
use hwcast_agent::types::SystemInfo;
use hwcast_agent::{AppState, BroadcastSettings, HardwareSource, MonitoringConfig, ServerConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct StubSource;

impl HardwareSource for StubSource {
    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            hostname: "stub".into(),
            os: "StubOS".into(),
            cpu_brand: "Stub CPU".into(),
            cores_physical: Some(1),
            cores_logical: 2,
            total_ram_bytes: 4 << 30,
        }
    }

    fn uptime_seconds(&self) -> u64 {
        7
    }

    fn cpu_info(&self) -> Result<CpuReading, CollectError> {
        Ok(CpuReading {
            utilization_percent: 25.0,
            per_core: vec![20.0, 30.0],
            frequency_mhz: 2400,
            load_average: None,
        })
    }

    fn cpu_temperature(&self) -> Result<f32, CollectError> {
        Err(CollectError::Unavailable("cpu temperature"))
    }

    fn memory_info(&self) -> Result<MemoryReading, CollectError> {
        Ok(MemoryReading {
            total: 4 << 30,
            used: 1 << 30,
            available: 3 << 30,
            swap_total: 0,
            swap_used: 0,
        })
    }

    fn disk_info(&self, drives: &[String]) -> Vec<(String, Result<DriveReading, CollectError>)> {
        drives
            .iter()
            .map(|p| {
                let r = if p == "/" || p == "/data" {
                    Ok(DriveReading {
                        device: "/dev/stub".into(),
                        filesystem: "ext4".into(),
                        total: 50 << 30,
                        available: 40 << 30,
                    })
                } else {
                    Err(CollectError::DriveNotFound(p.clone()))
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
                device: "/dev/stub".into(),
                filesystem: "ext4".into(),
            })
            .collect())
    }

    fn gpu_info(&self) -> Result<Vec<GpuReading>, CollectError> {
        Ok(vec![GpuReading {
            index: 0,
            name: "Stub GPU".into(),
            utilization: Ok(40),
            vram: Ok(VramReading {
                total: 4 << 30,
                used: 1 << 30,
            }),
            temperature: Ok(50),
        }])
    }

    fn gpu_present(&self) -> bool {
        true
    }
}

pub struct Agent {
    pub addr: SocketAddr,
    pub state: AppState,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl Agent {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger graceful shutdown and wait for the server to return.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn spawn_agent(monitoring: MonitoringConfig) -> Agent {
    let settings = BroadcastSettings {
        push_timeout: Duration::from_millis(500),
        sample_timeout: Duration::from_secs(2),
        ..BroadcastSettings::default()
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
    };
    let state = AppState::new(Arc::new(StubSource), monitoring, settings, server);
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(hwcast_agent::serve(listener, state.clone(), async move {
        let _ = rx.await;
    }));
    Agent {
        addr,
        state,
        stop: Some(tx),
        handle,
    }
}

/// Fast ticks so push tests do not wait long.
pub fn fast_config() -> MonitoringConfig {
    MonitoringConfig {
        refresh_rate: 0.1,
        ..MonitoringConfig::default()
    }
}
