//! Push-channel wire messages (JSON text frames, tagged by `type`).

use serde::Serialize;
use serde_json::Value;

use crate::registry::SubscriberId;
use crate::types::{Snapshot, ViewerData};

/// Where a served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Cache,
    Fresh,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Connected {
        message: &'static str,
        timestamp: f64,
        subscriber: u64,
    },
    MonitoringUpdate {
        timestamp: f64,
        data: ViewerData,
    },
    Status {
        data: &'a Snapshot,
        source: SnapshotSource,
    },
    Pong {
        timestamp: f64,
    },
    ServerShutdown {
        message: &'static str,
    },
    Error {
        message: String,
    },
}

impl<'a> ServerMessage<'a> {
    pub fn connected(id: SubscriberId) -> Self {
        ServerMessage::Connected {
            message: "Connected to hardware monitor",
            timestamp: unix_now(),
            subscriber: id.0,
        }
    }

    pub fn update(snapshot: &Snapshot) -> Self {
        ServerMessage::MonitoringUpdate {
            timestamp: snapshot.timestamp,
            data: ViewerData::from(snapshot),
        }
    }

    pub fn status(snapshot: &'a Snapshot, source: SnapshotSource) -> Self {
        ServerMessage::Status {
            data: snapshot,
            source,
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: unix_now(),
        }
    }

    pub fn shutdown() -> Self {
        ServerMessage::ServerShutdown {
            message: "Server is shutting down",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Every variant is plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"serialization failed: {e}"}}"#)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Ping,
    GetStatus { fresh: bool },
    Unsubscribe,
}

impl ClientMessage {
    /// Parse one text frame. The error string is sent back verbatim in an `error` frame.
    pub fn parse(text: &str) -> Result<Self, String> {
        let v: Value = serde_json::from_str(text).map_err(|_| "Invalid JSON format".to_string())?;
        let kind = v
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "Missing message type".to_string())?;
        match kind {
            "ping" => Ok(ClientMessage::Ping),
            "get_status" => Ok(ClientMessage::GetStatus {
                fresh: v.get("fresh").and_then(Value::as_bool).unwrap_or(false),
            }),
            "unsubscribe" => Ok(ClientMessage::Unsubscribe),
            other => Err(format!("Unknown message type: {other}")),
        }
    }
}

pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitoringConfig;
    use crate::sampler::assemble;
    use crate::testing::FakeSource;

    #[test]
    fn client_messages_parse() {
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#), Ok(ClientMessage::Ping));
        assert_eq!(
            ClientMessage::parse(r#"{"type":"get_status","fresh":true}"#),
            Ok(ClientMessage::GetStatus { fresh: true })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"get_status"}"#),
            Ok(ClientMessage::GetStatus { fresh: false })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"unsubscribe"}"#),
            Ok(ClientMessage::Unsubscribe)
        );
    }

    #[test]
    fn bad_client_messages_explain_themselves() {
        assert_eq!(ClientMessage::parse("not json").unwrap_err(), "Invalid JSON format");
        assert_eq!(
            ClientMessage::parse(r#"{"type":"reboot"}"#).unwrap_err(),
            "Unknown message type: reboot"
        );
        assert_eq!(ClientMessage::parse("{}").unwrap_err(), "Missing message type");
    }

    #[test]
    fn update_frame_has_compact_shape() {
        let (mut snap, _) = assemble(&FakeSource::healthy(), &MonitoringConfig::default());
        snap.timestamp = 12.5;
        let v: Value = serde_json::from_str(&ServerMessage::update(&snap).to_json()).unwrap();
        assert_eq!(v["type"], "monitoring_update");
        assert_eq!(v["timestamp"], 12.5);
        assert!(v["data"]["cpu"]["usage"].is_number());
        assert!(v["data"]["memory"]["total"].is_number());
        assert_eq!(v["data"]["drives"].as_array().unwrap().len(), 2);
        assert_eq!(v["data"]["gpus"][0]["name"], "Fake GPU 0");
    }

    #[test]
    fn control_frames_are_tagged() {
        let v: Value = serde_json::from_str(&ServerMessage::shutdown().to_json()).unwrap();
        assert_eq!(v["type"], "server_shutdown");
        let v: Value =
            serde_json::from_str(&ServerMessage::connected(SubscriberId(7)).to_json()).unwrap();
        assert_eq!(v["type"], "connected");
        assert_eq!(v["subscriber"], 7);
    }
}
