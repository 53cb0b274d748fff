//! Types that mirror the agent's push-channel JSON schema.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Cpu {
    pub usage: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Memory {
    pub percent: f64,
    pub used: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Drive {
    pub path: String,
    pub used_percent: f64,
    pub used_bytes: i64,
    pub total_bytes: i64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Gpu {
    pub name: String,
    pub gpu_utilization: f64,
    pub gpu_temperature: f64,
    pub vram_used_percent: f64,
    pub vram_used: i64,
    pub vram_total: i64,
}

/// Payload of one `monitoring_update`. Negative numbers mean "not collected".
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Update {
    pub cpu: Cpu,
    pub memory: Memory,
    #[serde(default)]
    pub drives: Vec<Drive>,
    #[serde(default)]
    pub gpus: Vec<Gpu>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Connected {
        #[serde(default)]
        subscriber: u64,
    },
    MonitoringUpdate {
        timestamp: f64,
        data: Update,
    },
    /// Full snapshot; kept loosely typed since viewers mostly print it.
    Status {
        data: Value,
        source: String,
    },
    Pong {
        timestamp: f64,
    },
    ServerShutdown {
        #[serde(default)]
        message: String,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}
