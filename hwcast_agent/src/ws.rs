//! WebSocket upgrade and per-connection handler.
//!
//! The socket is split: the sink lives in the registry as a [`PushChannel`]
//! (shared by broadcast frames and direct replies), the stream is read here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::future::BoxFuture;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PushError;
use crate::proto::{ClientMessage, ServerMessage};
use crate::registry::{PushChannel, Subscriber};
use crate::state::AppState;

pub struct WsChannel {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsChannel {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    async fn close(&self) {
        let _ = self.sink.lock().await.close().await;
    }
}

impl PushChannel for WsChannel {
    fn push(&self, frame: Arc<str>) -> BoxFuture<'_, Result<(), PushError>> {
        Box::pin(async move {
            self.sink
                .lock()
                .await
                .send(Message::Text(frame.to_string()))
                .await
                .map_err(|e| PushError::Transport(e.to_string()))
        })
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(socket: WebSocket, state: AppState, peer: Option<SocketAddr>) {
    let (sink, mut stream) = socket.split();
    let channel = Arc::new(WsChannel::new(sink));
    let sub = Subscriber {
        id: state.registry.allocate_id(),
        peer,
        channel: channel.clone(),
    };
    let limit = state.settings.push_timeout;

    // Greeting and the last known snapshot go out before the subscriber is
    // visible to the broadcast loop, so they always arrive first.
    let hello: Arc<str> = ServerMessage::connected(sub.id).to_json().into();
    if sub.push_with_timeout(hello, limit).await.is_err() {
        return;
    }
    if let Some(snap) = state.cache.get().await {
        let frame: Arc<str> = ServerMessage::update(&snap).to_json().into();
        if sub.push_with_timeout(frame, limit).await.is_err() {
            return;
        }
    }
    state.registry.add(sub.clone()).await;
    info!(subscriber = %sub.id, ?peer, "viewer connected");

    while let Some(msg) = stream.next().await {
        let reply = match msg {
            Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                Ok(ClientMessage::Ping) => ServerMessage::pong().to_json(),
                Ok(ClientMessage::GetStatus { fresh }) => {
                    match state.current_snapshot(fresh).await {
                        Ok((snap, source)) => ServerMessage::status(&snap, source).to_json(),
                        Err(e) => ServerMessage::error(format!("Status unavailable: {e}")).to_json(),
                    }
                }
                Ok(ClientMessage::Unsubscribe) => break,
                Err(reason) => {
                    debug!(subscriber = %sub.id, %reason, "bad client message");
                    ServerMessage::error(reason).to_json()
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(subscriber = %sub.id, "read error: {e}");
                break;
            }
        };
        if let Err(e) = sub.push_with_timeout(reply.into(), limit).await {
            debug!(subscriber = %sub.id, "reply failed: {e}");
            break;
        }
    }

    state.registry.remove(sub.id).await;
    channel.close().await;
    info!(subscriber = %sub.id, "viewer disconnected");
}
