// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-task reasoning traces and the store that mutates them.
//!
//! A task's [`TraceCollection`] keeps traces in arrival order; the ranked
//! order (score descending, arrival order on ties) is derived on demand by
//! [`TraceCollection::sorted`] and never stored.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::{debug, warn};

use crate::catalog::TaskCatalog;

/// A server-confirmed reasoning annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Server-assigned, globally unique id.
    pub trace_id: String,
    /// Owning task id.
    pub task_id: String,
    /// Free-text reasoning.
    pub text: String,
    /// Author display name.
    #[serde(rename = "username")]
    pub author: String,
    /// Community score (any sign).
    pub score: i64,
}

/// Traces of one task in arrival order, unique by `trace_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceCollection {
    traces: Vec<Trace>,
}

impl TraceCollection {
    /// Number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether no trace is attached.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Lookup by id.
    pub fn get(&self, trace_id: &str) -> Option<&Trace> {
        self.traces.iter().find(|t| t.trace_id == trace_id)
    }

    /// Whether a trace with this id is present.
    pub fn contains(&self, trace_id: &str) -> bool {
        self.get(trace_id).is_some()
    }

    /// Traces in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter()
    }

    /// Ranked view: score descending, arrival order on ties.
    pub fn sorted(&self) -> Vec<&Trace> {
        let mut view: Vec<&Trace> = self.traces.iter().collect();
        // stable
        view.sort_by_key(|t| Reverse(t.score));
        view
    }

    /// Append unless the id is already present. Returns whether it was added.
    pub fn push_unique(&mut self, trace: Trace) -> bool {
        if self.contains(&trace.trace_id) {
            return false;
        }
        self.traces.push(trace);
        true
    }

    /// Overwrite the score of `trace_id`. Returns whether it was found.
    pub fn set_score(&mut self, trace_id: &str, score: i64) -> bool {
        match self.traces.iter_mut().find(|t| t.trace_id == trace_id) {
            Some(t) => {
                t.score = score;
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.traces.clear();
    }
}

/// Result of [`TraceStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended to the task's collection.
    Added,
    /// Same `trace_id` already present; nothing changed.
    Duplicate,
    /// No loaded task carries the trace's `task_id`.
    UnknownTask,
}

/// Mutating view over the traces owned by a [`TaskCatalog`]'s tasks.
///
/// Obtained via [`TaskCatalog::traces_mut`]; also maintains the catalog's
/// trace display cursor.
pub struct TraceStore<'a> {
    catalog: &'a mut TaskCatalog,
}

impl<'a> TraceStore<'a> {
    pub(crate) fn new(catalog: &'a mut TaskCatalog) -> Self {
        Self { catalog }
    }

    // Shared ids resolve to the current task first, then to the id index.
    fn target(&self, task_id: &str) -> Option<usize> {
        self.catalog
            .current
            .filter(|&i| self.catalog.tasks[i].id() == Some(task_id))
            .or_else(|| self.catalog.index_of(task_id))
    }

    /// Replace a task's whole collection with an authoritative snapshot and
    /// reset the display cursor. Returns `false` when `task_id` is unknown.
    ///
    /// Traces belonging to another task, and repeated ids, are dropped.
    pub fn attach(&mut self, task_id: &str, traces: Vec<Trace>) -> bool {
        let Some(index) = self.target(task_id) else {
            warn!(task_id, "snapshot for unknown task ignored");
            return false;
        };
        let collection = &mut self.catalog.tasks[index].traces;
        collection.clear();
        for trace in traces {
            if trace.task_id != task_id {
                warn!(task_id, trace_id = %trace.trace_id, owner = %trace.task_id, "foreign trace in snapshot dropped");
                continue;
            }
            if !collection.push_unique(trace) {
                warn!(task_id, "repeated trace id in snapshot dropped");
            }
        }
        debug!(task_id, count = collection.len(), "traces attached");
        if self.catalog.current == Some(index) {
            self.catalog.reset_trace_cursor();
        }
        true
    }

    /// Append a server-confirmed trace to its task.
    ///
    /// Repeated delivery of the same `trace_id` is a no-op. When the trace
    /// lands on the current task, the display cursor returns to the top of
    /// the ranked view.
    pub fn add(&mut self, trace: Trace) -> AddOutcome {
        let Some(index) = self.target(&trace.task_id) else {
            warn!(task_id = %trace.task_id, "new trace for unknown task");
            return AddOutcome::UnknownTask;
        };
        let trace_id = trace.trace_id.clone();
        if !self.catalog.tasks[index].traces.push_unique(trace) {
            debug!(%trace_id, "duplicate new trace ignored");
            return AddOutcome::Duplicate;
        }
        if self.catalog.current == Some(index) {
            self.catalog.reset_trace_cursor();
        }
        AddOutcome::Added
    }

    /// Overwrite the score of a trace of the current task.
    ///
    /// Unknown ids (or no current task) are logged and ignored; returns
    /// whether a score changed hands.
    pub fn apply_vote(&mut self, trace_id: &str, score: i64) -> bool {
        let Some(index) = self.catalog.current else {
            warn!(trace_id, "score update with no current task");
            return false;
        };
        let applied = self.catalog.tasks[index].traces.set_score(trace_id, score);
        if applied {
            self.catalog.clamp_trace_cursor();
        } else {
            warn!(trace_id, "score update for unknown trace");
        }
        applied
    }

    /// Ranked view of a task's traces (empty for unknown ids).
    pub fn sorted_view(&self, task_id: &str) -> Vec<&Trace> {
        self.catalog
            .task_by_id(task_id)
            .map(|t| t.traces().sorted())
            .unwrap_or_default()
    }

    /// Move the display cursor one step down the ranking (no-op at the end).
    pub fn advance(&mut self) -> bool {
        let count = self.catalog.current_trace_count();
        match self.catalog.trace_cursor {
            Some(i) if i + 1 < count => {
                self.catalog.trace_cursor = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    /// Move the display cursor one step up the ranking (no-op at the top).
    pub fn retreat(&mut self) -> bool {
        match self.catalog.trace_cursor {
            Some(i) if i > 0 => {
                self.catalog.trace_cursor = Some(i - 1);
                true
            }
            _ => false,
        }
    }
}
