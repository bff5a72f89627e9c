// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session wire schema for the arc-trace hub (trace requests, votes and
//! server pushes). Messages travel as `OpEnvelope`s inside framed packets;
//! see [`wire`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod wire;

/// Default Unix socket path for the trace hub.
///
/// Prefers a per-user runtime dir (XDG_RUNTIME_DIR) and falls back to `/tmp`
/// when unavailable.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("arc-trace.sock")
}

/// Canonical envelope carried as the payload of a packet.
///
/// * `op` – event name (e.g. `request_traces`, `trace_updated`).
/// * `ts` – logical timestamp (sender-local, informational).
/// * `payload` – event specific body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Event name.
    pub op: String,
    /// Logical timestamp.
    pub ts: u64,
    /// Event-specific body.
    pub payload: P,
}

/// Signed vote delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// +1
    Up,
    /// -1
    Down,
}

impl Vote {
    /// Wire value (`+1` / `-1`).
    pub fn delta(self) -> i8 {
        match self {
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }
}

impl serde::Serialize for Vote {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i8(self.delta())
    }
}

impl<'de> serde::Deserialize<'de> for Vote {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match i64::deserialize(deserializer)? {
            1 => Ok(Vote::Up),
            -1 => Ok(Vote::Down),
            other => Err(serde::de::Error::custom(format!(
                "vote must be +1 or -1, got {other}"
            ))),
        }
    }
}

/// Trace as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceRecord {
    /// Server-assigned, globally unique id.
    pub trace_id: String,
    /// Owning task.
    pub task_id: String,
    /// Free-text reasoning.
    pub text: String,
    /// Author display name.
    pub username: String,
    /// Community score.
    #[serde(default)]
    pub score: i64,
}

/// `request_traces` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestTracesPayload {
    /// Task whose traces are requested.
    pub task_id: String,
}

/// `add_trace` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddTracePayload {
    /// Task the trace annotates.
    pub task_id: String,
    /// Author display name.
    pub username: String,
    /// Trace text.
    pub text: String,
}

/// `vote_trace` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteTracePayload {
    /// Trace voted on.
    pub trace_id: String,
    /// Voter display name.
    pub username: String,
    /// Signed delta.
    pub vote: Vote,
}

/// `connection_ack` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionAckPayload {
    /// Greeting text.
    pub message: String,
}

/// `initial_traces` body: the authoritative snapshot for one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitialTracesPayload {
    /// Task the snapshot belongs to.
    pub task_id: String,
    /// Traces in server order.
    #[serde(default)]
    pub traces: Vec<TraceRecord>,
}

/// `trace_updated` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceUpdatedPayload {
    /// Owning task.
    pub task_id: String,
    /// Updated trace.
    pub trace_id: String,
    /// Server-computed score.
    pub score: i64,
}

/// `trace_error` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceErrorPayload {
    /// Human readable message, surfaced verbatim.
    pub message: String,
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Ask for a task's trace snapshot (op = "request_traces").
    RequestTraces(RequestTracesPayload),
    /// Submit a new trace (op = "add_trace").
    AddTrace(AddTracePayload),
    /// Vote on a trace (op = "vote_trace").
    VoteTrace(VoteTracePayload),
}

impl ClientMessage {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            ClientMessage::RequestTraces(_) => "request_traces",
            ClientMessage::AddTrace(_) => "add_trace",
            ClientMessage::VoteTrace(_) => "vote_trace",
        }
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting after connect (op = "connection_ack").
    ConnectionAck(ConnectionAckPayload),
    /// Authoritative snapshot for a task (op = "initial_traces").
    InitialTraces(InitialTracesPayload),
    /// Broadcast of a server-confirmed addition (op = "new_trace").
    NewTrace(TraceRecord),
    /// Broadcast of a server-confirmed score (op = "trace_updated").
    TraceUpdated(TraceUpdatedPayload),
    /// Server-side failure for the sender's last action (op = "trace_error").
    TraceError(TraceErrorPayload),
}

impl ServerMessage {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            ServerMessage::ConnectionAck(_) => "connection_ack",
            ServerMessage::InitialTraces(_) => "initial_traces",
            ServerMessage::NewTrace(_) => "new_trace",
            ServerMessage::TraceUpdated(_) => "trace_updated",
            ServerMessage::TraceError(_) => "trace_error",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn vote_serializes_as_signed_integer() {
        assert_eq!(serde_json::to_string(&Vote::Up).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Vote::Down).unwrap(), "-1");
        assert_eq!(serde_json::from_str::<Vote>("-1").unwrap(), Vote::Down);
        assert!(serde_json::from_str::<Vote>("2").is_err());
    }

    #[test]
    fn trace_record_ignores_server_bookkeeping_fields() {
        let json = r#"{"trace_id":"t1","task_id":"a","text":"rotate","username":"ann",
            "score":3,"timestamp":1.5,"voters":{"bob":1}}"#;
        let rec: TraceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.score, 3);
        assert_eq!(rec.username, "ann");
    }
}
