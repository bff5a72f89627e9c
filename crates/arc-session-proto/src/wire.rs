// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic framing and CBOR helpers.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is a CBOR `OpEnvelope`
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use ciborium::value::Value;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{ClientMessage, OpEnvelope, ServerMessage, TraceRecord};

/// Protocol magic constant "ARCT".
pub const MAGIC: [u8; 4] = [0x41, 0x52, 0x43, 0x54];
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_BYTES: usize = 12;
/// Trailing checksum length in bytes.
pub const CHECKSUM_BYTES: usize = 32;
/// Largest payload accepted by [`frame_len`].
pub const MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Framing or codec failure.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes than the header/length announce.
    #[error("incomplete packet: need {needed} bytes, have {have}")]
    Incomplete {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        have: usize,
    },
    /// Magic constant mismatch.
    #[error("bad magic")]
    BadMagic,
    /// Unknown protocol version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Payload longer than [`MAX_PAYLOAD`].
    #[error("payload of {0} bytes exceeds limit")]
    TooLarge(usize),
    /// Checksum over header||payload did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// CBOR serialization failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// CBOR deserialization failed.
    #[error("decode error: {0}")]
    Decode(String),
    /// Envelope carried an op this side does not understand.
    #[error("unknown op {0}")]
    UnknownOp(String),
}

/// Encode to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

/// Total packet length announced by a header, after validating magic,
/// version and the payload limit.
pub fn frame_len(header: &[u8; HEADER_BYTES]) -> Result<usize, WireError> {
    if header[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if len > MAX_PAYLOAD {
        return Err(WireError::TooLarge(len));
    }
    Ok(HEADER_BYTES + len + CHECKSUM_BYTES)
}

/// A full packet (header + payload + checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw header (12 bytes).
    pub header: [u8; HEADER_BYTES],
    /// CBOR payload bytes.
    pub payload: Vec<u8>,
    /// blake3 checksum over header||payload.
    pub checksum: [u8; CHECKSUM_BYTES],
}

impl Packet {
    /// Build a packet from a CBOR payload.
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, WireError> {
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&l| l as usize <= MAX_PAYLOAD)
            .ok_or(WireError::TooLarge(payload.len()))?;
        let mut header = [0u8; HEADER_BYTES];
        header[0..4].copy_from_slice(&MAGIC);
        header[4..6].copy_from_slice(&VERSION.to_be_bytes());
        header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
        header[8..12].copy_from_slice(&len.to_be_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&header);
        hasher.update(&payload);
        let checksum = *hasher.finalize().as_bytes();

        Ok(Packet {
            header,
            payload,
            checksum,
        })
    }

    /// Concatenated wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.payload.len() + CHECKSUM_BYTES);
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.checksum);
        out
    }

    /// Encode an `OpEnvelope` into a full packet byte vector.
    pub fn encode_envelope<P: Serialize>(env: &OpEnvelope<P>) -> Result<Vec<u8>, WireError> {
        let payload = to_cbor(env)?;
        Ok(Packet::from_payload(payload)?.to_bytes())
    }

    /// Decode a packet from a byte slice, returning the envelope and bytes consumed.
    pub fn decode_envelope<P: DeserializeOwned>(
        bytes: &[u8],
    ) -> Result<(OpEnvelope<P>, usize), WireError> {
        let Some(header) = bytes.first_chunk::<HEADER_BYTES>() else {
            return Err(WireError::Incomplete {
                needed: HEADER_BYTES + CHECKSUM_BYTES,
                have: bytes.len(),
            });
        };
        let total = frame_len(header)?;
        if bytes.len() < total {
            return Err(WireError::Incomplete {
                needed: total,
                have: bytes.len(),
            });
        }
        let payload = &bytes[HEADER_BYTES..total - CHECKSUM_BYTES];
        let checksum = &bytes[total - CHECKSUM_BYTES..total];

        let mut hasher = Hasher::new();
        hasher.update(header);
        hasher.update(payload);
        if hasher.finalize().as_bytes() != checksum {
            return Err(WireError::ChecksumMismatch);
        }

        let env: OpEnvelope<P> = from_cbor(payload)?;
        Ok((env, total))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, WireError> {
    Value::serialized(value).map_err(|e| WireError::Encode(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, WireError> {
    value
        .deserialized()
        .map_err(|e| WireError::Decode(e.to_string()))
}

fn seal(op: &str, ts: u64, payload: Value) -> Result<Vec<u8>, WireError> {
    let env = OpEnvelope {
        op: op.to_string(),
        ts,
        payload,
    };
    Packet::encode_envelope(&env)
}

/// Encode a client event into a packet with the provided logical timestamp.
pub fn encode_client(msg: &ClientMessage, ts: u64) -> Result<Vec<u8>, WireError> {
    let payload = match msg {
        ClientMessage::RequestTraces(p) => to_value(p)?,
        ClientMessage::AddTrace(p) => to_value(p)?,
        ClientMessage::VoteTrace(p) => to_value(p)?,
    };
    seal(msg.op_name(), ts, payload)
}

/// Decode bytes into (ClientMessage, ts, bytes_consumed).
pub fn decode_client(bytes: &[u8]) -> Result<(ClientMessage, u64, usize), WireError> {
    let (env, used) = Packet::decode_envelope::<Value>(bytes)?;
    let msg = match env.op.as_str() {
        "request_traces" => ClientMessage::RequestTraces(from_value(&env.payload)?),
        "add_trace" => ClientMessage::AddTrace(from_value(&env.payload)?),
        "vote_trace" => ClientMessage::VoteTrace(from_value(&env.payload)?),
        other => return Err(WireError::UnknownOp(other.to_string())),
    };
    Ok((msg, env.ts, used))
}

/// Encode a server event into a packet with the provided logical timestamp.
pub fn encode_server(msg: &ServerMessage, ts: u64) -> Result<Vec<u8>, WireError> {
    let payload = match msg {
        ServerMessage::ConnectionAck(p) => to_value(p)?,
        ServerMessage::InitialTraces(p) => to_value(p)?,
        ServerMessage::NewTrace(p) => to_value::<TraceRecord>(p)?,
        ServerMessage::TraceUpdated(p) => to_value(p)?,
        ServerMessage::TraceError(p) => to_value(p)?,
    };
    seal(msg.op_name(), ts, payload)
}

/// Decode bytes into (ServerMessage, ts, bytes_consumed).
pub fn decode_server(bytes: &[u8]) -> Result<(ServerMessage, u64, usize), WireError> {
    let (env, used) = Packet::decode_envelope::<Value>(bytes)?;
    let msg = match env.op.as_str() {
        "connection_ack" => ServerMessage::ConnectionAck(from_value(&env.payload)?),
        "initial_traces" => ServerMessage::InitialTraces(from_value(&env.payload)?),
        "new_trace" => ServerMessage::NewTrace(from_value(&env.payload)?),
        "trace_updated" => ServerMessage::TraceUpdated(from_value(&env.payload)?),
        "trace_error" => ServerMessage::TraceError(from_value(&env.payload)?),
        other => return Err(WireError::UnknownOp(other.to_string())),
    };
    Ok((msg, env.ts, used))
}

// --- Unit tests -----------------------------------------------------------
