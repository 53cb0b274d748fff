//! Minimal WebSocket client helpers for talking to the agent.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::types::ServerFrame;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid agent url {0}: {1}")]
    Url(String, String),

    #[error("websocket: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("agent closed the connection")]
    Closed,

    #[error("agent error: {0}")]
    Agent(String),
}

/// Accepts `ws://host:port/ws` or a bare `host:port`. The agent speaks plain ws only.
pub fn parse_url(raw: &str) -> Result<Url, ClientError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("ws://{raw}/ws")
    };
    let url = Url::parse(&candidate).map_err(|e| ClientError::Url(raw.into(), e.to_string()))?;
    match url.scheme() {
        "ws" => Ok(url),
        other => Err(ClientError::Url(raw.into(), format!("unsupported scheme {other}"))),
    }
}

// Connect to the agent and return the WS stream
pub async fn connect(url: &Url) -> Result<WsStream, ClientError> {
    let (ws, _) = connect_async(url.as_str()).await?;
    Ok(ws)
}

/// Next decodable frame. `Ok(None)` on a clean close.
pub async fn next_frame(ws: &mut WsStream, wait: Duration) -> Result<Option<ServerFrame>, ClientError> {
    loop {
        let msg = match tokio::time::timeout(wait, ws.next()).await {
            Err(_) => return Err(ClientError::Timeout(wait)),
            Ok(None) => return Ok(None),
            Ok(Some(m)) => m?,
        };
        match msg {
            Message::Text(json) => {
                if let Ok(frame) = serde_json::from_str::<ServerFrame>(&json) {
                    return Ok(Some(frame));
                }
            }
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
}

async fn send_json(ws: &mut WsStream, v: serde_json::Value) -> Result<(), ClientError> {
    ws.send(Message::Text(v.to_string())).await?;
    Ok(())
}

/// Send `get_status` and wait for the `status` reply, skipping pushes in between.
pub async fn request_status(
    ws: &mut WsStream,
    fresh: bool,
    wait: Duration,
) -> Result<serde_json::Value, ClientError> {
    send_json(ws, json!({"type": "get_status", "fresh": fresh})).await?;
    loop {
        match next_frame(ws, wait).await? {
            Some(ServerFrame::Status { data, .. }) => return Ok(data),
            Some(ServerFrame::Error { message }) => return Err(ClientError::Agent(message)),
            Some(_) => continue,
            None => return Err(ClientError::Closed),
        }
    }
}

/// Round-trip a `ping`; returns the agent's timestamp.
pub async fn ping(ws: &mut WsStream, wait: Duration) -> Result<f64, ClientError> {
    send_json(ws, json!({"type": "ping"})).await?;
    loop {
        match next_frame(ws, wait).await? {
            Some(ServerFrame::Pong { timestamp }) => return Ok(timestamp),
            Some(_) => continue,
            None => return Err(ClientError::Closed),
        }
    }
}
