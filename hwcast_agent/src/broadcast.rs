//! Broadcast loop: sample, cache, fan the same frame out to every subscriber,
//! prune the ones that failed, sleep.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{PushError, SampleError};
use crate::proto::ServerMessage;
use crate::registry::Subscriber;
use crate::state::AppState;

/// Outcome of one broadcast tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sampled: bool,
    pub delivered: usize,
    pub removed: usize,
}

/// One tick without the sleep. A total sampling failure leaves the cache and
/// the registry untouched.
pub async fn run_tick(state: &AppState) -> Result<TickReport, SampleError> {
    let snapshot = Arc::new(state.sampler.sample().await?);
    // A concurrent fresh sample may already have stored something newer.
    if !state.cache.set_if_newer(Arc::clone(&snapshot)).await {
        debug!(timestamp = snapshot.timestamp, "tick snapshot superseded in cache");
    }

    let members = state.registry.snapshot_members().await;
    if members.is_empty() {
        return Ok(TickReport {
            sampled: true,
            ..TickReport::default()
        });
    }

    // Serialize once; every subscriber gets the identical bytes.
    let frame: Arc<str> = ServerMessage::update(&snapshot).to_json().into();
    let failed = push_all(&members, frame, state.settings.push_timeout).await;

    let mut removed = 0;
    for (sub, err) in &failed {
        warn!(subscriber = %sub.id, peer = ?sub.peer, "dropping subscriber: {err}");
        if state.registry.remove(sub.id).await {
            removed += 1;
        }
    }

    Ok(TickReport {
        sampled: true,
        delivered: members.len() - failed.len(),
        removed,
    })
}

/// Push `frame` to every member concurrently; returns the ones that failed.
async fn push_all(
    members: &[Subscriber],
    frame: Arc<str>,
    limit: Duration,
) -> Vec<(Subscriber, PushError)> {
    let pushes = members
        .iter()
        .map(|m| m.push_with_timeout(Arc::clone(&frame), limit));
    join_all(pushes)
        .await
        .into_iter()
        .zip(members)
        .filter_map(|(r, m)| r.err().map(|e| (m.clone(), e)))
        .collect()
}

/// Best-effort `server_shutdown` to everyone still registered. Returns how
/// many received it.
pub async fn notify_shutdown(state: &AppState) -> usize {
    let members = state.registry.snapshot_members().await;
    if members.is_empty() {
        return 0;
    }
    let frame: Arc<str> = ServerMessage::shutdown().to_json().into();
    let failed = push_all(&members, frame, state.settings.push_timeout).await;
    members.len() - failed.len()
}

/// Spawn the single broadcast task. It runs until `shutdown` flips to true
/// (or its sender is dropped), then notifies subscribers and exits.
pub fn spawn_broadcaster(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("broadcast loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let interval = state.config.current().await.interval();
            let delay = match run_tick(&state).await {
                Ok(report) => {
                    debug!(
                        delivered = report.delivered,
                        removed = report.removed,
                        "tick complete"
                    );
                    interval
                }
                Err(e) => {
                    let backoff = interval * state.settings.backoff_factor;
                    error!(backoff_ms = backoff.as_millis() as u64, "sampling failed: {e}");
                    backoff
                }
            };
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        let notified = notify_shutdown(&state).await;
        info!(notified, "broadcast loop stopped");
    })
}
