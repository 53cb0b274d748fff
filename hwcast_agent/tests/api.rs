//! Request/response routes against an in-process agent.

mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::spawn_agent;
use hwcast_agent::MonitoringConfig;

fn quiet() -> MonitoringConfig {
    MonitoringConfig {
        refresh_rate: 60.0,
        ..MonitoringConfig::default()
    }
}

async fn get(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn post(url: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn status_reports_snapshot_and_server_metadata() {
    let agent = spawn_agent(quiet()).await;
    let (code, body) = get(&agent.http("/api/status")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["ram"]["total_bytes"], 4_i64 << 30);
    assert_eq!(data["server"]["websocket_path"], "/ws");
    assert_eq!(data["server"]["port"], agent.addr.port());

    let (_, fresh) = get(&agent.http("/api/status?fresh=true")).await;
    assert_eq!(fresh["data"]["server"]["source"], "fresh");
    assert!(fresh["data"]["timestamp"].as_f64() >= data["timestamp"].as_f64());
    agent.stop().await;
}

#[tokio::test]
async fn status_always_carries_every_category() {
    let agent = spawn_agent(MonitoringConfig {
        enable_disk: false,
        enable_gpu: false,
        ..quiet()
    })
    .await;
    let (code, body) = get(&agent.http("/api/status")).await;
    assert_eq!(code, StatusCode::OK);
    for key in ["cpu", "ram", "disk", "gpu"] {
        assert!(body["data"][key].is_object(), "{key} missing");
    }
    assert_eq!(body["data"]["disk"]["enabled"], false);
    assert_eq!(body["data"]["disk"]["total"]["total_bytes"], -1);
    assert!(agent.state.cache.get().await.is_some());
    agent.stop().await;
}

#[tokio::test]
async fn config_update_ignores_unknown_keys_and_rejects_bad_values() {
    let agent = spawn_agent(quiet()).await;

    let (code, body) = post(
        &agent.http("/api/config"),
        json!({"enable_ram": false, "theme": "dark"}),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["monitoring"]["enable_ram"], false);
    assert!(body["data"]["monitoring"].get("theme").is_none());

    let (code, body) = post(
        &agent.http("/api/config"),
        json!({"monitoring": {"refresh_rate": 0.0, "enable_cpu": false}}),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("refresh_rate"));

    let (_, body) = get(&agent.http("/api/config")).await;
    assert_eq!(body["data"]["monitoring"]["enable_cpu"], true);
    assert_eq!(body["data"]["monitoring"]["refresh_rate"], 60.0);
    assert_eq!(body["data"]["server"]["host"], "127.0.0.1");
    agent.stop().await;
}

#[tokio::test]
async fn malformed_json_body_is_a_400_envelope() {
    let agent = spawn_agent(quiet()).await;
    let resp = reqwest::Client::new()
        .post(agent.http("/api/config"))
        .header("content-type", "application/json")
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
    agent.stop().await;
}

#[tokio::test]
async fn disabled_category_is_not_available() {
    let agent = spawn_agent(MonitoringConfig {
        enable_cpu: false,
        ..quiet()
    })
    .await;
    let (code, body) = get(&agent.http("/api/cpu")).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "CPU monitoring not available");

    let (code, body) = get(&agent.http("/api/memory")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["used_bytes"], 1_i64 << 30);
    agent.stop().await;
}

#[tokio::test]
async fn disk_query_distinguishes_unmonitored_drives() {
    let agent = spawn_agent(MonitoringConfig {
        selected_drives: vec!["/".into()],
        ..quiet()
    })
    .await;

    let (_, body) = get(&agent.http("/api/disk?path=/")).await;
    assert_eq!(body["data"]["available"], true);
    assert_eq!(body["data"]["drive"]["path"], "/");

    let (code, body) = get(&agent.http("/api/disk?path=/data")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["available"], false);
    assert_eq!(body["data"]["present_on_system"], true);

    let (_, body) = get(&agent.http("/api/disk?path=/nowhere")).await;
    assert_eq!(body["data"]["available"], false);
    assert_eq!(body["data"]["present_on_system"], false);

    let (_, body) = get(&agent.http("/api/drives")).await;
    assert_eq!(body["data"]["available"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["monitored"], json!(["/"]));
    assert_eq!(body["data"]["auto_detect"], false);
    agent.stop().await;
}

#[tokio::test]
async fn gpu_config_only_touches_gpu_keys() {
    let agent = spawn_agent(quiet()).await;
    let (code, body) = post(
        &agent.http("/api/gpu/config"),
        json!({"enable_gpu": false, "enable_cpu": false}),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["monitoring"]["enable_gpu"], false);
    assert_eq!(body["data"]["monitoring"]["enable_cpu"], true);

    let (_, body) = get(&agent.http("/api/status?fresh=1")).await;
    assert_eq!(body["data"]["gpu"]["gpus"][0]["gpu_utilization"], -1.0);
    assert!(body["data"]["gpu"]["gpus"][0]["vram_total"].as_i64().unwrap() > 0);

    let (code, body) = get(&agent.http("/api/gpu")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["vram_enabled"], true);
    agent.stop().await;
}

#[tokio::test]
async fn system_view_lists_capabilities() {
    let agent = spawn_agent(quiet()).await;
    let (code, body) = get(&agent.http("/api/system")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["data"]["system"]["cpu_brand"], "Stub CPU");
    assert_eq!(body["data"]["capabilities"]["gpu_available"], true);
    agent.stop().await;
}
