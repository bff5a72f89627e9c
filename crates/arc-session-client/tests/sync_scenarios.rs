// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]
use arc_app_core::app::{AppState, Navigation};
use arc_session_client::sync::{SyncClient, TraceView};
use arc_session_client::{pump, SessionClient};
use arc_session_proto::wire::{decode_client, encode_server, frame_len, HEADER_BYTES};
use arc_session_proto::{
    ClientMessage, InitialTracesPayload, ServerMessage, TraceRecord, TraceUpdatedPayload, Vote,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

fn dataset() -> Value {
    json!([
        {"train": [], "test": [{"input": [[0]]}]},
        {"id": "t2", "train": [], "test": [{"input": [[1]]}]},
    ])
}

fn record(id: &str, score: i64) -> TraceRecord {
    TraceRecord {
        trace_id: id.into(),
        task_id: "t2".into(),
        text: "count the corners".into(),
        username: "bob".into(),
        score,
    }
}

fn online() -> (SyncClient, AppState) {
    let mut app = AppState::new("ann");
    let mut sync = SyncClient::new();
    sync.connecting();
    sync.connected(&mut app);
    (sync, app)
}

#[test]
fn task_without_id_shows_empty_view_immediately() {
    let (mut sync, mut app) = online();
    sync.load_dataset(&mut app, "original", dataset()).unwrap();
    assert_eq!(sync.trace_view(&app), TraceView::Empty);
    assert!(sync.awaiting_snapshot().is_none());
    assert!(sync.drain_outbox().is_empty());
    assert!(sync.submit_add(&app, "anything").is_err());
}

#[test]
fn duplicate_new_trace_stores_one() {
    let (mut sync, mut app) = online();
    sync.load_dataset(&mut app, "original", dataset()).unwrap();
    sync.navigate(&mut app, Navigation::Next).unwrap();
    for _ in 0..2 {
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("x", 0)));
    }
    let task = app.catalog().current_task().unwrap();
    assert_eq!(task.traces().len(), 1);
}

#[test]
fn unmatched_trace_update_still_reenables_votes() {
    let (mut sync, mut app) = online();
    sync.load_dataset(&mut app, "original", dataset()).unwrap();
    sync.navigate(&mut app, Navigation::Id("t2".into())).unwrap();
    sync.dispatch(
        &mut app,
        ServerMessage::InitialTraces(InitialTracesPayload {
            task_id: "t2".into(),
            traces: vec![record("x", 3)],
        }),
    );
    sync.submit_vote(&app, Vote::Down).unwrap();
    assert!(!sync.vote_controls_enabled(&app));
    sync.dispatch(
        &mut app,
        ServerMessage::TraceUpdated(TraceUpdatedPayload {
            task_id: "t2".into(),
            trace_id: "someone-else".into(),
            score: 99,
        }),
    );
    assert!(sync.vote_controls_enabled(&app));
    assert_eq!(app.displayed_trace().unwrap().1.score, 3);
}

async fn read_client_message(stream: &mut UnixStream) -> ClientMessage {
    let mut header = [0u8; HEADER_BYTES];
    stream.read_exact(&mut header).await.unwrap();
    let mut packet = vec![0u8; frame_len(&header).unwrap()];
    packet[..HEADER_BYTES].copy_from_slice(&header);
    stream.read_exact(&mut packet[HEADER_BYTES..]).await.unwrap();
    decode_client(&packet).unwrap().0
}

#[tokio::test]
async fn pump_round_trips_with_hub() {
    let (client_stream, mut hub) = UnixStream::pair().unwrap();
    let mut client = SessionClient::from_stream(client_stream);
    let (mut sync, mut app) = online();
    sync.load_dataset(&mut app, "original", dataset()).unwrap();
    sync.navigate(&mut app, Navigation::Next).unwrap();
    assert_eq!(sync.trace_view(&app), TraceView::Loading);

    let hub_task = tokio::spawn(async move {
        let ClientMessage::RequestTraces(req) = read_client_message(&mut hub).await else {
            panic!("expected request_traces");
        };
        let reply = ServerMessage::InitialTraces(InitialTracesPayload {
            task_id: req.task_id,
            traces: vec![record("x", 1), record("y", 2)],
        });
        hub.write_all(&encode_server(&reply, 1).unwrap()).await.unwrap();
        hub
    });

    assert!(pump(&mut client, &mut sync, &mut app).await.unwrap());
    match sync.trace_view(&app) {
        TraceView::Showing { trace, total, .. } => {
            assert_eq!(total, 2);
            assert_eq!(trace.trace_id, "y");
        }
        other => panic!("unexpected view {other:?}"),
    }

    drop(hub_task.await.unwrap());
    assert!(!pump(&mut client, &mut sync, &mut app).await.unwrap());
    assert!(!sync.is_connected());
}
