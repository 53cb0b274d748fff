// gpu.rs
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use tracing::info;

use crate::error::CollectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VramReading {
    pub total: u64,
    pub used: u64,
}

/// One device; each field is read independently so one failing driver call
/// only blanks that field.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReading {
    pub index: u32,
    pub name: String,
    pub utilization: Result<u32, CollectError>, // 0..100
    pub vram: Result<VramReading, CollectError>,
    pub temperature: Result<u32, CollectError>, // celsius
}

/// NVML handle, loaded once. Absent when the driver library is missing.
pub struct GpuProbe {
    nvml: Option<Nvml>,
    count: u32,
}

impl GpuProbe {
    pub fn init() -> Self {
        match Nvml::init() {
            Ok(nvml) => {
                let count = nvml.device_count().unwrap_or(0);
                let driver = nvml.sys_driver_version().unwrap_or_else(|_| "unknown".into());
                info!(count, %driver, "NVML initialized");
                Self {
                    nvml: Some(nvml),
                    count,
                }
            }
            Err(e) => {
                info!("NVML not available, GPU metrics disabled: {e}");
                Self {
                    nvml: None,
                    count: 0,
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.nvml.is_some() && self.count > 0
    }

    pub fn collect(&self) -> Result<Vec<GpuReading>, CollectError> {
        let nvml = self.nvml.as_ref().ok_or(CollectError::Unavailable("gpu"))?;
        let count = nvml
            .device_count()
            .map_err(|e| CollectError::other(format!("nvml device count: {e}")))?;

        let gpu_err = |index: u32, e: nvml_wrapper::error::NvmlError| CollectError::Gpu {
            index,
            message: e.to_string(),
        };

        let mut out = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = match nvml.device_by_index(index) {
                Ok(d) => d,
                Err(e) => {
                    let err = gpu_err(index, e);
                    out.push(GpuReading {
                        index,
                        name: format!("GPU {index}"),
                        utilization: Err(err.clone()),
                        vram: Err(err.clone()),
                        temperature: Err(err),
                    });
                    continue;
                }
            };
            out.push(GpuReading {
                index,
                name: device.name().unwrap_or_else(|_| format!("GPU {index}")),
                utilization: device
                    .utilization_rates()
                    .map(|u| u.gpu)
                    .map_err(|e| gpu_err(index, e)),
                vram: device
                    .memory_info()
                    .map(|m| VramReading {
                        total: m.total,
                        used: m.used,
                    })
                    .map_err(|e| gpu_err(index, e)),
                temperature: device
                    .temperature(TemperatureSensor::Gpu)
                    .map_err(|e| gpu_err(index, e)),
            });
        }
        Ok(out)
    }
}
