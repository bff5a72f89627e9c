// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side trace synchronization.
//!
//! [`SyncClient`] mediates between the transport and the trace replica
//! held in [`AppState`]. Outbound actions are validated locally and queued
//! in an outbox for the transport to flush; inbound server events go through
//! [`SyncClient::dispatch`] in arrival order. It never mutates traces on
//! its own behalf: additions and scores land only when the server echoes
//! them.

use arc_app_core::app::{AppState, LoadOutcome, Navigation};
use arc_app_core::traces::Trace;
use arc_app_core::AppError;
use arc_session_proto::{
    AddTracePayload, ClientMessage, RequestTracesPayload, ServerMessage, TraceRecord, Vote,
    VoteTracePayload,
};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

const NOT_CONNECTED: &str = "Not connected to real-time server.";

/// Transport status as seen by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport is being opened.
    Connecting,
    /// Transport open; server actions allowed.
    Connected,
}

/// What a renderer should show in the trace panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceView<'a> {
    /// No task loaded.
    Hidden,
    /// Snapshot requested, not yet received.
    Loading,
    /// The task has no traces.
    Empty,
    /// One trace of the ranked view.
    Showing {
        /// Position in the ranked view.
        position: usize,
        /// Traces in the collection.
        total: usize,
        /// The trace under the cursor.
        trace: &'a Trace,
    },
}

/// Convert a wire record into a stored trace.
pub fn trace_from_record(record: TraceRecord) -> Trace {
    Trace {
        trace_id: record.trace_id,
        task_id: record.task_id,
        text: record.text,
        author: record.username,
        score: record.score,
    }
}

/// Connection bookkeeping plus the outbound queue.
#[derive(Debug, Default)]
pub struct SyncClient {
    state: ConnectionState,
    outbox: VecDeque<ClientMessage>,
    awaiting_snapshot: Option<String>,
    vote_pending: bool,
}

impl SyncClient {
    /// Disconnected client with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current transport status.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether server actions are currently possible.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Task id whose snapshot has been requested and not yet received.
    pub fn awaiting_snapshot(&self) -> Option<&str> {
        self.awaiting_snapshot.as_deref()
    }

    /// Whether a vote is waiting for its score update.
    pub fn vote_pending(&self) -> bool {
        self.vote_pending
    }

    /// Vote buttons are usable: a trace is shown and no vote is in flight.
    pub fn vote_controls_enabled(&self, app: &AppState) -> bool {
        !self.vote_pending && app.displayed_trace().is_some()
    }

    /// Trace panel projection for the current task.
    pub fn trace_view<'a>(&self, app: &'a AppState) -> TraceView<'a> {
        let Some(task) = app.catalog().current_task() else {
            return TraceView::Hidden;
        };
        if task.id().is_some() && task.id() == self.awaiting_snapshot() {
            return TraceView::Loading;
        }
        match app.displayed_trace() {
            Some((position, trace)) => TraceView::Showing {
                position,
                total: task.traces().len(),
                trace,
            },
            None => TraceView::Empty,
        }
    }

    /// Take every queued outbound message, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    /// Transport is being opened.
    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Transport is up; re-syncs the current task's traces.
    pub fn connected(&mut self, app: &mut AppState) {
        info!("connected to trace server");
        self.state = ConnectionState::Connected;
        if app.catalog().current_task().is_some() {
            self.task_loaded(app);
        }
    }

    /// Transport dropped. Queued messages are discarded; a vote in flight
    /// keeps its controls disabled.
    pub fn on_disconnected(&mut self, app: &mut AppState) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        warn!(dropped = self.outbox.len(), "disconnected from trace server");
        self.state = ConnectionState::Disconnected;
        self.outbox.clear();
        self.awaiting_snapshot = None;
        app.notices_mut()
            .error("Disconnected from real-time server.");
    }

    /// Load a dataset and request traces for its first task.
    pub fn load_dataset(
        &mut self,
        app: &mut AppState,
        name: &str,
        data: Value,
    ) -> Result<LoadOutcome, AppError> {
        let outcome = app.load_dataset(name, data)?;
        if outcome == LoadOutcome::Loaded {
            self.task_loaded(app);
        }
        Ok(outcome)
    }

    /// Navigate and request traces when a task was opened.
    pub fn navigate(&mut self, app: &mut AppState, nav: Navigation) -> Result<bool, AppError> {
        let opened = app.navigate(nav)?;
        if opened {
            self.task_loaded(app);
        }
        Ok(opened)
    }

    /// A task was just opened: ask the server for its traces.
    ///
    /// Tasks without an id, or a missing connection, fall back to the local
    /// (possibly empty) trace view at once.
    pub fn task_loaded(&mut self, app: &mut AppState) {
        self.awaiting_snapshot = None;
        let Some(task_id) = app
            .catalog()
            .current_task()
            .and_then(|t| t.id())
            .map(str::to_owned)
        else {
            debug!("task has no id; showing local traces");
            return;
        };
        if let Err(err) = self.request_traces(&task_id) {
            app.report(&err);
        }
    }

    /// Queue a snapshot request for `task_id`.
    pub fn request_traces(&mut self, task_id: &str) -> Result<(), AppError> {
        self.require_connection()?;
        debug!(task_id, "requesting traces");
        self.awaiting_snapshot = Some(task_id.to_owned());
        self.outbox
            .push_back(ClientMessage::RequestTraces(RequestTracesPayload {
                task_id: task_id.to_owned(),
            }));
        Ok(())
    }

    /// Queue a new trace for the current task. Nothing is stored locally
    /// until the server broadcasts it back.
    pub fn submit_add(&mut self, app: &AppState, text: &str) -> Result<(), AppError> {
        let task = app
            .catalog()
            .current_task()
            .ok_or_else(|| AppError::validation("Cannot add trace: No task loaded."))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::validation("Trace text cannot be empty."));
        }
        let task_id = task
            .id()
            .ok_or_else(|| AppError::validation("Cannot add trace: Task ID is missing."))?;
        self.require_connection()?;
        info!(task_id, "submitting trace");
        self.outbox.push_back(ClientMessage::AddTrace(AddTracePayload {
            task_id: task_id.to_owned(),
            username: app.username().to_owned(),
            text: text.to_owned(),
        }));
        Ok(())
    }

    /// Queue a vote on the displayed trace and disable vote controls until
    /// the server answers.
    pub fn submit_vote(&mut self, app: &AppState, vote: Vote) -> Result<(), AppError> {
        if app.catalog().current_task().is_none() {
            return Err(AppError::validation("Cannot vote: No task loaded."));
        }
        let (_, trace) = app
            .displayed_trace()
            .ok_or_else(|| AppError::validation("Cannot vote: No traces to vote on."))?;
        if self.vote_pending {
            return Err(AppError::validation("A vote is already pending."));
        }
        self.require_connection()?;
        info!(trace_id = %trace.trace_id, delta = vote.delta(), "submitting vote");
        self.outbox
            .push_back(ClientMessage::VoteTrace(VoteTracePayload {
                trace_id: trace.trace_id.clone(),
                username: app.username().to_owned(),
                vote,
            }));
        self.vote_pending = true;
        Ok(())
    }

    /// Apply one inbound server event.
    pub fn dispatch(&mut self, app: &mut AppState, msg: ServerMessage) {
        debug!(op = msg.op_name(), "server event");
        match msg {
            ServerMessage::ConnectionAck(ack) => {
                info!(message = %ack.message, "server acknowledged connection");
            }
            ServerMessage::InitialTraces(snapshot) => {
                let current = app.catalog().current_task().and_then(|t| t.id());
                if current != Some(snapshot.task_id.as_str()) {
                    debug!(task_id = %snapshot.task_id, "stale snapshot ignored");
                    return;
                }
                let traces = snapshot.traces.into_iter().map(trace_from_record).collect();
                app.traces_mut().attach(&snapshot.task_id, traces);
                if self.awaiting_snapshot.as_deref() == Some(snapshot.task_id.as_str()) {
                    self.awaiting_snapshot = None;
                }
            }
            ServerMessage::NewTrace(record) => {
                app.traces_mut().add(trace_from_record(record));
            }
            ServerMessage::TraceUpdated(update) => {
                app.traces_mut().apply_vote(&update.trace_id, update.score);
                self.vote_pending = false;
            }
            ServerMessage::TraceError(err) => {
                warn!(message = %err.message, "server reported an error");
                app.notices_mut()
                    .error(format!("Server error: {}", err.message));
                self.vote_pending = false;
            }
        }
    }

    fn require_connection(&self) -> Result<(), AppError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AppError::Connection(NOT_CONNECTED.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use arc_app_core::notice::NoticeKind;
    use arc_session_proto::{InitialTracesPayload, TraceErrorPayload, TraceUpdatedPayload};
    use serde_json::json;

    fn record(task: &str, id: &str, score: i64) -> TraceRecord {
        TraceRecord {
            trace_id: id.into(),
            task_id: task.into(),
            text: "because".into(),
            username: "ann".into(),
            score,
        }
    }

    fn session() -> (SyncClient, AppState) {
        let mut app = AppState::new("ann");
        let mut sync = SyncClient::new();
        sync.connected(&mut app);
        sync.load_dataset(
            &mut app,
            "original",
            json!([
                {"id": "t1", "train": [], "test": [{"input": [[1]]}]},
                {"id": "t2", "train": [], "test": [{"input": [[2]]}]},
            ]),
        )
        .unwrap();
        (sync, app)
    }

    #[test]
    fn load_requests_first_task_snapshot() {
        let (mut sync, app) = session();
        assert_eq!(sync.trace_view(&app), TraceView::Loading);
        assert_eq!(
            sync.drain_outbox(),
            vec![ClientMessage::RequestTraces(RequestTracesPayload {
                task_id: "t1".into()
            })]
        );
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let (mut sync, mut app) = session();
        sync.navigate(&mut app, Navigation::Next).unwrap();
        sync.dispatch(
            &mut app,
            ServerMessage::InitialTraces(InitialTracesPayload {
                task_id: "t1".into(),
                traces: vec![record("t1", "a", 1)],
            }),
        );
        assert!(app.catalog().task_by_id("t1").unwrap().traces().is_empty());
        assert_eq!(sync.awaiting_snapshot(), Some("t2"));
        sync.dispatch(
            &mut app,
            ServerMessage::InitialTraces(InitialTracesPayload {
                task_id: "t2".into(),
                traces: vec![record("t2", "b", 0), record("t2", "c", 4)],
            }),
        );
        match sync.trace_view(&app) {
            TraceView::Showing { position, total, trace } => {
                assert_eq!((position, total), (0, 2));
                assert_eq!(trace.trace_id, "c");
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn snapshot_for_shared_id_fills_the_current_task() {
        let mut app = AppState::new("ann");
        let mut sync = SyncClient::new();
        sync.connected(&mut app);
        sync.load_dataset(
            &mut app,
            "merged",
            json!([
                {"id": "dup", "train": [], "test": [{"input": [[1]]}]},
                {"id": "dup", "train": [], "test": [{"input": [[2]]}]},
            ]),
        )
        .unwrap();
        sync.dispatch(
            &mut app,
            ServerMessage::InitialTraces(InitialTracesPayload {
                task_id: "dup".into(),
                traces: vec![record("dup", "x", 2)],
            }),
        );
        assert_eq!(app.catalog().current_index(), Some(0));
        assert!(app.catalog().tasks()[1].traces().is_empty());
        match sync.trace_view(&app) {
            TraceView::Showing { total, trace, .. } => {
                assert_eq!(total, 1);
                assert_eq!(trace.trace_id, "x");
            }
            other => panic!("unexpected view {other:?}"),
        }
    }

    #[test]
    fn add_is_sent_but_not_stored() {
        let (mut sync, mut app) = session();
        sync.drain_outbox();
        assert!(matches!(
            sync.submit_add(&app, "   "),
            Err(AppError::Validation(_))
        ));
        sync.submit_add(&app, " rotate it ").unwrap();
        assert!(app.catalog().current_task().unwrap().traces().is_empty());
        match sync.drain_outbox().as_slice() {
            [ClientMessage::AddTrace(p)] => {
                assert_eq!(p.text, "rotate it");
                assert_eq!(p.username, "ann");
            }
            other => panic!("unexpected outbox {other:?}"),
        }
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "n1", 0)));
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "n1", 0)));
        assert_eq!(app.catalog().current_task().unwrap().traces().len(), 1);
    }

    #[test]
    fn vote_disables_controls_until_update() {
        let (mut sync, mut app) = session();
        assert!(sync.submit_vote(&app, Vote::Up).is_err());
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "a", 0)));
        assert!(sync.vote_controls_enabled(&app));
        sync.submit_vote(&app, Vote::Up).unwrap();
        assert!(!sync.vote_controls_enabled(&app));
        assert!(sync.submit_vote(&app, Vote::Up).is_err());
        sync.dispatch(
            &mut app,
            ServerMessage::TraceUpdated(TraceUpdatedPayload {
                task_id: "t1".into(),
                trace_id: "a".into(),
                score: 1,
            }),
        );
        assert!(sync.vote_controls_enabled(&app));
        assert_eq!(app.displayed_trace().unwrap().1.score, 1);
    }

    #[test]
    fn server_error_is_surfaced_and_reenables_controls() {
        let (mut sync, mut app) = session();
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "a", 0)));
        sync.submit_vote(&app, Vote::Down).unwrap();
        app.notices_mut().drain();
        sync.dispatch(
            &mut app,
            ServerMessage::TraceError(TraceErrorPayload {
                message: "Trace not found".into(),
            }),
        );
        assert!(!sync.vote_pending());
        let notices = app.notices_mut().drain();
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert_eq!(notices[0].text, "Server error: Trace not found");
    }

    #[test]
    fn offline_actions_raise_connection_errors() {
        let (mut sync, mut app) = session();
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "a", 0)));
        sync.on_disconnected(&mut app);
        assert_eq!(sync.state(), ConnectionState::Disconnected);
        assert!(sync.drain_outbox().is_empty());
        assert!(matches!(
            sync.submit_add(&app, "text"),
            Err(AppError::Connection(_))
        ));
        assert!(matches!(
            sync.submit_vote(&app, Vote::Up),
            Err(AppError::Connection(_))
        ));
        app.notices_mut().drain();
        sync.navigate(&mut app, Navigation::Next).unwrap();
        assert_eq!(sync.trace_view(&app), TraceView::Empty);
        let notices = app.notices_mut().drain();
        assert!(notices.iter().any(|n| n.text == NOT_CONNECTED));
    }

    #[test]
    fn disconnect_keeps_pending_vote_disabled() {
        let (mut sync, mut app) = session();
        sync.dispatch(&mut app, ServerMessage::NewTrace(record("t1", "a", 0)));
        sync.submit_vote(&app, Vote::Up).unwrap();
        sync.on_disconnected(&mut app);
        assert!(sync.vote_pending());
        assert!(!sync.vote_controls_enabled(&app));
    }
}
