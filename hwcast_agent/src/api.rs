//! HTTP request/response routes. Every body is `{success, data?, error?}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{ConfigPatch, GpuConfigPatch, MonitoringConfig, WEBSOCKET_PATH};
use crate::proto::SnapshotSource;
use crate::state::AppState;
use crate::types::Snapshot;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data: Some(data),
        error: None,
    })
    .into_response()
}

fn fail(status: StatusCode, error: impl Into<String>) -> Response {
    let body: Envelope<()> = Envelope {
        success: false,
        data: None,
        error: Some(error.into()),
    };
    (status, Json(body)).into_response()
}

fn not_available(what: &str) -> Response {
    fail(
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{what} monitoring not available"),
    )
}

fn flag(q: &HashMap<String, String>, key: &str) -> bool {
    q.get(key)
        .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

async fn latest_or_fail(state: &AppState) -> Result<Arc<Snapshot>, Response> {
    state.latest().await.map_err(|e| {
        warn!("on-demand sample failed: {e}");
        fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Hardware sampling failed: {e}"),
        )
    })
}

#[derive(Serialize)]
struct ServerMeta<'a> {
    version: &'static str,
    host: &'a str,
    port: u16,
    websocket_path: &'static str,
    connections: usize,
    uptime_seconds: f64,
    source: SnapshotSource,
    cache_age_seconds: Option<f64>,
}

#[derive(Serialize)]
struct StatusView<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    server: ServerMeta<'a>,
}

pub async fn status(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let (snapshot, source) = match state.current_snapshot(flag(&q, "fresh")).await {
        Ok(v) => v,
        Err(e) => {
            warn!("status sample failed: {e}");
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Hardware sampling failed: {e}"),
            );
        }
    };
    let view = StatusView {
        snapshot: &snapshot,
        server: ServerMeta {
            version: env!("CARGO_PKG_VERSION"),
            host: &state.server.host,
            port: state.server.port,
            websocket_path: WEBSOCKET_PATH,
            connections: state.registry.count().await,
            uptime_seconds: state.started_at.elapsed().as_secs_f64(),
            source,
            cache_age_seconds: state.cache.age().await.map(|a| a.as_secs_f64()),
        },
    };
    ok(view)
}

fn config_view(state: &AppState, monitoring: &MonitoringConfig) -> Value {
    json!({
        "server": {
            "host": state.server.host,
            "port": state.server.port,
            "websocket_path": WEBSOCKET_PATH,
        },
        "monitoring": monitoring,
    })
}

pub async fn get_config(State(state): State<AppState>) -> Response {
    let cfg = state.config.current().await;
    ok(config_view(&state, &cfg))
}

pub async fn post_config(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}")),
    };
    let patch = match ConfigPatch::from_json(&body) {
        Ok(p) => p,
        Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
    };
    apply(&state, &patch).await
}

pub async fn post_gpu_config(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}")),
    };
    let patch = match GpuConfigPatch::from_json(&body) {
        Ok(p) => ConfigPatch::from(p),
        Err(e) => return fail(StatusCode::BAD_REQUEST, e.to_string()),
    };
    apply(&state, &patch).await
}

async fn apply(state: &AppState, patch: &ConfigPatch) -> Response {
    if patch.is_empty() {
        debug!("configuration update carried no recognised keys");
    }
    match state.config.update(patch).await {
        Ok(cfg) => {
            info!(generation = state.config.generation(), ?patch, "configuration updated");
            ok(config_view(state, &cfg))
        }
        Err(e) => {
            warn!("configuration update rejected: {e}");
            fail(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

pub async fn cpu(State(state): State<AppState>) -> Response {
    let snap = match latest_or_fail(&state).await {
        Ok(s) => s,
        Err(r) => return r,
    };
    if !snap.cpu.enabled {
        return not_available("CPU");
    }
    ok(&snap.cpu)
}

pub async fn memory(State(state): State<AppState>) -> Response {
    let snap = match latest_or_fail(&state).await {
        Ok(s) => s,
        Err(r) => return r,
    };
    if !snap.ram.enabled {
        return not_available("Memory");
    }
    ok(&snap.ram)
}

pub async fn disk(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let snap = match latest_or_fail(&state).await {
        Ok(s) => s,
        Err(r) => return r,
    };
    let Some(path) = q.get("path") else {
        if !snap.disk.enabled {
            return not_available("Disk");
        }
        return ok(&snap.disk);
    };

    if let Some(drive) = snap.disk.drive(path) {
        return ok(json!({ "available": true, "path": path, "drive": drive }));
    }
    let present_on_system = match state.sampler.available_drives().await {
        Ok(mounts) => mounts.iter().any(|m| &m.path == path),
        Err(e) => {
            warn!("drive listing failed: {e}");
            false
        }
    };
    ok(json!({
        "available": false,
        "path": path,
        "present_on_system": present_on_system,
        "monitored_drives": snap.disk.monitored_drives,
    }))
}

pub async fn drives(State(state): State<AppState>) -> Response {
    let available = match state.sampler.available_drives().await {
        Ok(v) => v,
        Err(e) => {
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Drive listing failed: {e}"),
            )
        }
    };
    let cfg = state.config.current().await;
    let monitored: Vec<String> = if cfg.selected_drives.is_empty() {
        available.iter().map(|m| m.path.clone()).collect()
    } else {
        cfg.selected_drives.clone()
    };
    ok(json!({
        "available": available,
        "monitored": monitored,
        "auto_detect": cfg.selected_drives.is_empty(),
    }))
}

pub async fn gpu(State(state): State<AppState>) -> Response {
    let snap = match latest_or_fail(&state).await {
        Ok(s) => s,
        Err(r) => return r,
    };
    let g = &snap.gpu;
    let any_on = g.enabled || g.vram_enabled || g.temperature_enabled;
    if !any_on || (g.gpus.is_empty() && g.error.is_some()) {
        return not_available("GPU");
    }
    ok(g)
}

pub async fn system(State(state): State<AppState>) -> Response {
    let source = state.sampler.source();
    let cfg = state.config.current().await;
    ok(json!({
        "system": source.system_info(),
        "capabilities": {
            "gpu_available": source.gpu_present(),
            "cpu": cfg.enable_cpu,
            "ram": cfg.enable_ram,
            "disk": cfg.enable_disk,
            "gpu": cfg.enable_gpu,
            "vram": cfg.enable_vram,
            "temperature": cfg.enable_temperature,
        },
        "agent_version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accepts_common_truthy_values() {
        let mut q = HashMap::new();
        assert!(!flag(&q, "fresh"));
        q.insert("fresh".to_string(), "TRUE".to_string());
        assert!(flag(&q, "fresh"));
        q.insert("fresh".to_string(), "0".to_string());
        assert!(!flag(&q, "fresh"));
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some("nope".into()),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, json!({"success": false, "error": "nope"}));
    }
}
