//! Agent configuration: startup flags (with env fallbacks) and the runtime
//! monitoring toggles that viewers may change while the agent is running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 8888;
pub const WEBSOCKET_PATH: &str = "/ws";

pub const MIN_REFRESH_RATE: f64 = 0.1;
pub const MAX_REFRESH_RATE: f64 = 300.0;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "hwcast_agent",
    version,
    about = "Samples local hardware counters and pushes them to viewers over WebSocket"
)]
pub struct AgentArgs {
    /// Address to bind the HTTP/WebSocket server to
    #[arg(long, env = "HWCAST_AGENT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, env = "HWCAST_AGENT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Broadcast interval in seconds
    #[arg(short, long, env = "HWCAST_AGENT_INTERVAL", default_value_t = 1.0)]
    pub interval: f64,

    /// Collect GPU utilization and VRAM (NVML)
    #[arg(long, env = "HWCAST_AGENT_GPU", default_value_t = true, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub gpu: bool,

    /// Collect GPU temperatures
    #[arg(long, env = "HWCAST_AGENT_TEMP", default_value_t = true, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub temp: bool,

    /// Mount points to monitor (repeat or comma separate); default is every real drive
    #[arg(long = "drive", env = "HWCAST_AGENT_DRIVES", value_delimiter = ',')]
    pub drives: Vec<String>,

    /// Per-subscriber push deadline in milliseconds
    #[arg(long, env = "HWCAST_AGENT_PUSH_TIMEOUT_MS", default_value_t = 2_000)]
    pub push_timeout_ms: u64,

    /// Deadline for one hardware sample in milliseconds
    #[arg(long, env = "HWCAST_AGENT_SAMPLE_TIMEOUT_MS", default_value_t = 3_000)]
    pub sample_timeout_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl AgentArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn monitoring_config(&self) -> Result<MonitoringConfig, ConfigError> {
        let cfg = MonitoringConfig {
            refresh_rate: self.interval,
            enable_gpu: self.gpu,
            enable_vram: self.gpu,
            enable_temperature: self.temp,
            selected_drives: self.drives.clone(),
            ..MonitoringConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn broadcast_settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            push_timeout: Duration::from_millis(self.push_timeout_ms.max(1)),
            sample_timeout: Duration::from_millis(self.sample_timeout_ms.max(1)),
            ..BroadcastSettings::default()
        }
    }
}

/// Where the agent listens. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Timing knobs for the broadcast loop and the sampler.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    pub push_timeout: Duration,
    pub sample_timeout: Duration,
    /// Multiplier applied to the refresh interval after a failed sample.
    pub backoff_factor: u32,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            push_timeout: Duration::from_secs(2),
            sample_timeout: Duration::from_secs(3),
            backoff_factor: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub refresh_rate: f64,
    pub enable_cpu: bool,
    pub enable_ram: bool,
    pub enable_disk: bool,
    pub enable_gpu: bool,
    pub enable_vram: bool,
    pub enable_temperature: bool,
    /// Empty means every real drive the OS reports.
    pub selected_drives: Vec<String>,
    /// Empty means every GPU.
    pub gpu_indices: Vec<u32>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 1.0,
            enable_cpu: true,
            enable_ram: true,
            enable_disk: true,
            enable_gpu: true,
            enable_vram: true,
            enable_temperature: true,
            selected_drives: Vec::new(),
            gpu_indices: Vec::new(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_REFRESH_RATE..=MAX_REFRESH_RATE).contains(&self.refresh_rate) {
            return Err(ConfigError::RefreshRate {
                value: self.refresh_rate,
                min: MIN_REFRESH_RATE,
                max: MAX_REFRESH_RATE,
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.refresh_rate)
    }

    /// True when any GPU-backed category is on, i.e. the GPU collector must run.
    pub fn wants_gpu(&self) -> bool {
        self.enable_gpu || self.enable_vram || self.enable_temperature
    }

    pub fn gpu_selected(&self, index: u32) -> bool {
        self.gpu_indices.is_empty() || self.gpu_indices.contains(&index)
    }

    /// Returns a copy with `patch` applied, or an error if the result is invalid.
    /// `self` is never modified, so a rejected patch leaves nothing half-applied.
    pub fn patched(&self, patch: &ConfigPatch) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(v) = patch.refresh_rate {
            next.refresh_rate = v;
        }
        if let Some(v) = patch.enable_cpu {
            next.enable_cpu = v;
        }
        if let Some(v) = patch.enable_ram {
            next.enable_ram = v;
        }
        if let Some(v) = patch.enable_disk {
            next.enable_disk = v;
        }
        if let Some(v) = patch.enable_gpu {
            next.enable_gpu = v;
        }
        if let Some(v) = patch.enable_vram {
            next.enable_vram = v;
        }
        if let Some(v) = patch.enable_temperature {
            next.enable_temperature = v;
        }
        if let Some(v) = &patch.selected_drives {
            next.selected_drives = v.clone();
        }
        if let Some(v) = &patch.gpu_indices {
            next.gpu_indices = v.clone();
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial monitoring update. Keys not listed here are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigPatch {
    pub refresh_rate: Option<f64>,
    pub enable_cpu: Option<bool>,
    pub enable_ram: Option<bool>,
    pub enable_disk: Option<bool>,
    pub enable_gpu: Option<bool>,
    pub enable_vram: Option<bool>,
    pub enable_temperature: Option<bool>,
    pub selected_drives: Option<Vec<String>>,
    pub gpu_indices: Option<Vec<u32>>,
}

impl ConfigPatch {
    /// Accepts either flat monitoring keys or the nested `{"monitoring": {...}}`
    /// form that `GET /api/config` returns.
    pub fn from_json(body: &Value) -> Result<Self, ConfigError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ConfigError::Malformed("expected a JSON object".into()))?;
        let section = match obj.get("monitoring") {
            Some(nested @ Value::Object(_)) => nested,
            Some(_) => return Err(ConfigError::Malformed("`monitoring` must be an object".into())),
            None => body,
        };
        serde_json::from_value(section.clone()).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }
}

/// GPU-only partial update (`POST /api/gpu/config`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GpuConfigPatch {
    pub enable_gpu: Option<bool>,
    pub enable_vram: Option<bool>,
    pub enable_temperature: Option<bool>,
    pub gpu_indices: Option<Vec<u32>>,
}

impl GpuConfigPatch {
    pub fn from_json(body: &Value) -> Result<Self, ConfigError> {
        if !body.is_object() {
            return Err(ConfigError::Malformed("expected a JSON object".into()));
        }
        serde_json::from_value(body.clone()).map_err(|e| ConfigError::Malformed(e.to_string()))
    }
}

impl From<GpuConfigPatch> for ConfigPatch {
    fn from(p: GpuConfigPatch) -> Self {
        ConfigPatch {
            enable_gpu: p.enable_gpu,
            enable_vram: p.enable_vram,
            enable_temperature: p.enable_temperature,
            gpu_indices: p.gpu_indices,
            ..ConfigPatch::default()
        }
    }
}

/// Runtime monitoring configuration shared by the sampler and the request server.
/// Every accepted update bumps `generation`, which the sampler uses to reset
/// its log suppression.
#[derive(Debug)]
pub struct SharedConfig {
    current: RwLock<MonitoringConfig>,
    generation: AtomicU64,
}

impl SharedConfig {
    pub fn new(cfg: MonitoringConfig) -> Self {
        Self {
            current: RwLock::new(cfg),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn current(&self) -> MonitoringConfig {
        self.current.read().await.clone()
    }

    /// Config together with the generation it belongs to.
    pub async fn versioned(&self) -> (MonitoringConfig, u64) {
        let guard = self.current.read().await;
        (guard.clone(), self.generation.load(Ordering::Acquire))
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn update(&self, patch: &ConfigPatch) -> Result<MonitoringConfig, ConfigError> {
        let mut guard = self.current.write().await;
        let next = guard.patched(patch)?;
        *guard = next.clone();
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(next)
    }
}
