//! Control message schemas.
//!
//! Client commands are JSON objects tagged by `command`; server replies are
//! either a bare JSON array (the source list) or a `command`-tagged object.

use serde::{Deserialize, Serialize};

/// Bandwidth trend carried in heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increase,
    Decrease,
    Hold,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Ask for the list of playable sources.
    GetList,
    /// Start streaming the named source (a file name or `"camera"`).
    Play { source: String },
    /// Jump to a position in seconds.
    Seek { time: f64 },
    Pause,
    Resume,
    /// Periodic feedback with the client's clock for latency estimation.
    Heartbeat { trend: Trend, client_ts: i64 },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Reply to `get_list`: file names plus `"camera"`.
    SourceList(Vec<String>),
    /// Tagged reply objects.
    Event(ServerEvent),
    /// Failure report for a rejected command.
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Playback started; `duration` in seconds, 0 for live sources.
    PlayInfo { duration: f64 },
    /// Echo of a heartbeat's `client_ts`.
    HeartbeatReply { client_ts: i64 },
}

impl ServerMessage {
    pub fn play_info(duration: f64) -> Self {
        ServerMessage::Event(ServerEvent::PlayInfo { duration })
    }

    pub fn heartbeat_reply(client_ts: i64) -> Self {
        ServerMessage::Event(ServerEvent::HeartbeatReply { client_ts })
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: reason.into(),
        }
    }
}
