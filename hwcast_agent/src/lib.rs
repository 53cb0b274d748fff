//! hwcast_agent library: hardware sampler, snapshot cache, subscriber
//! registry, broadcast loop and the HTTP/WebSocket request server.

pub mod api;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod gpu;
pub mod hardware;
pub mod proto;
pub mod registry;
pub mod sampler;
pub mod state;
pub mod types;
pub mod ws;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::{AgentArgs, BroadcastSettings, MonitoringConfig, ServerConfig};
pub use hardware::{HardwareSource, SysinfoSource};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(config::WEBSOCKET_PATH, get(ws::ws_handler))
        .route("/api/status", get(api::status))
        .route("/api/config", get(api::get_config).post(api::post_config))
        .route("/api/cpu", get(api::cpu))
        .route("/api/memory", get(api::memory))
        .route("/api/disk", get(api::disk))
        .route("/api/drives", get(api::drives))
        .route("/api/gpu", get(api::gpu))
        .route("/api/gpu/config", post(api::post_gpu_config))
        .route("/api/system", get(api::system))
        .with_state(state)
}

/// Run the broadcast loop and the request server on `listener` until
/// `shutdown` resolves. Subscribers get a `server_shutdown` frame before the
/// listener stops accepting.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let broadcaster = broadcast::spawn_broadcaster(state.clone(), stop_rx);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, path = config::WEBSOCKET_PATH, "hwcast agent listening");
    }

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown requested");
            let _ = stop_tx.send(true);
            let _ = broadcaster.await;
        })
        .await;
    info!("server stopped");
    result
}
