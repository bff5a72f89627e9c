// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client for the arc-trace hub over Unix sockets (CBOR-framed), plus the
//! [`sync::SyncClient`] engine that applies hub events to local state.

use anyhow::Result;
use arc_app_core::app::AppState;
use arc_session_proto::wire::{decode_server, encode_client, frame_len, HEADER_BYTES};
use arc_session_proto::{ClientMessage, ServerMessage};
use std::io;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};

pub mod sync;

use sync::SyncClient;

/// Minimal async client over a Unix socket.
pub struct SessionClient {
    stream: UnixStream,
    next_ts: u64,
}

impl SessionClient {
    /// Connect to the hub at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream, next_ts: 0 }
    }

    /// Send one message.
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        self.next_ts += 1;
        let pkt = encode_client(msg, self.next_ts)?;
        self.stream.write_all(&pkt).await?;
        debug!(op = msg.op_name(), ts = self.next_ts, "sent");
        Ok(())
    }

    /// Read one message. Returns `Ok(None)` when the stream closes before
    /// any byte of a new frame arrives.
    ///
    /// Reads until a full frame header is buffered so short reads cannot
    /// desynchronize framing.
    pub async fn poll_message(&mut self) -> Result<Option<ServerMessage>> {
        let mut header = [0u8; HEADER_BYTES];
        let mut read = 0usize;
        while read < header.len() {
            let n = self.stream.read(&mut header[read..]).await?;
            if n == 0 {
                if read == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated frame header: read {read} of {HEADER_BYTES} bytes"),
                )
                .into());
            }
            read += n;
        }
        let total = frame_len(&header)?;
        let mut packet = vec![0u8; total];
        packet[..HEADER_BYTES].copy_from_slice(&header);
        self.stream.read_exact(&mut packet[HEADER_BYTES..]).await?;
        let (msg, _ts, _) = decode_server(&packet)?;
        Ok(Some(msg))
    }

    /// Expose the underlying stream (e.g. for `select!`).
    pub fn stream(&mut self) -> &mut UnixStream {
        &mut self.stream
    }
}

/// One event-loop turn: flush the outbox, then apply one inbound event.
///
/// Returns `Ok(false)` once the hub has closed the connection. Transport
/// failures mark the session disconnected before being returned.
pub async fn pump(
    client: &mut SessionClient,
    sync: &mut SyncClient,
    app: &mut AppState,
) -> Result<bool> {
    for msg in sync.drain_outbox() {
        if let Err(err) = client.send(&msg).await {
            warn!(%err, "send failed");
            sync.on_disconnected(app);
            return Err(err);
        }
    }
    match client.poll_message().await {
        Ok(Some(msg)) => {
            sync.dispatch(app, msg);
            Ok(true)
        }
        Ok(None) => {
            sync.on_disconnected(app);
            Ok(false)
        }
        Err(err) => {
            warn!(%err, "receive failed");
            sync.on_disconnected(app);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use arc_session_proto::wire::encode_server;
    use arc_session_proto::TraceErrorPayload;
    use tokio::task;

    #[tokio::test]
    async fn poll_message_handles_partial_header_without_losing_bytes() {
        let (client_stream, mut server_stream) = UnixStream::pair().unwrap();
        let msg = ServerMessage::TraceError(TraceErrorPayload {
            message: "keep frame aligned".into(),
        });
        let encoded = encode_server(&msg, 42).unwrap();

        let client_task = task::spawn(async move {
            let mut client = SessionClient::from_stream(client_stream);
            client.poll_message().await
        });

        server_stream.write_all(&encoded[..5]).await.unwrap();
        task::yield_now().await;
        server_stream.write_all(&encoded[5..]).await.unwrap();

        match client_task.await.unwrap().unwrap() {
            Some(got) => assert_eq!(got, msg),
            None => panic!("expected a message"),
        }
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let (client_stream, mut server_stream) = UnixStream::pair().unwrap();
        let mut client = SessionClient::from_stream(client_stream);
        server_stream.write_all(b"ARC").await.unwrap();
        drop(server_stream);
        assert!(client.poll_message().await.is_err());
    }

    #[tokio::test]
    async fn clean_close_is_none() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        drop(server_stream);
        let mut client = SessionClient::from_stream(client_stream);
        assert!(client.poll_message().await.unwrap().is_none());
    }
}
