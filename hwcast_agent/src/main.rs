//! hwcast_agent binary: parse flags, take a first sample, bind and serve.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hwcast_agent::{AgentArgs, AppState, HardwareSource, SysinfoSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AgentArgs::parse();
    init_tracing(args.debug);

    let monitoring = args.monitoring_config().context("invalid monitoring flags")?;
    let server = args.server_config();
    let settings = args.broadcast_settings();

    let source = tokio::task::spawn_blocking(SysinfoSource::new)
        .await
        .context("hardware init")?;
    let source: Arc<dyn HardwareSource> = Arc::new(source);
    let state = AppState::new(source, monitoring, settings, server.clone());

    // A sampler that cannot produce even one snapshot at startup is fatal.
    let first = state.sampler.sample().await.map_err(|e| {
        error!("initial hardware sample failed: {e}");
        anyhow::anyhow!(e)
    })?;
    info!(
        hostname = %first.system.hostname,
        hardware = first.monitoring_status.hardware_available,
        gpu = first.monitoring_status.gpu_available,
        "initial sample ok"
    );
    state.cache.set(Arc::new(first)).await;

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    hwcast_agent::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
