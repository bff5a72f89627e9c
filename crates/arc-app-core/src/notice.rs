// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded queue of user-facing notices with a dedupe window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::AppError;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note.
    Info,
    /// Failed action or server error.
    Error,
}

/// Identifier for a notice entry.
pub type NoticeId = u64;

/// One message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Message text.
    pub text: String,
    /// When it was (last) pushed.
    pub created: Instant,
}

/// In-memory notice queue.
///
/// At most `max` notices are kept; the oldest is dropped on overflow.
#[derive(Debug)]
pub struct NoticeBoard {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NoticeBoard {
    /// Board holding up to `max` notices (at least one).
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a notice. An identical notice pushed within the dedupe window is
    /// refreshed in place and keeps its id.
    pub fn push(&mut self, kind: NoticeKind, text: impl Into<String>, now: Instant) -> NoticeId {
        let text = text.into();
        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.text == text
                && now.saturating_duration_since(n.created) <= self.dedupe_window
        }) {
            existing.created = now;
            return existing.id;
        }
        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            text,
            created: now,
        });
        id
    }

    /// Push an info notice stamped now.
    pub fn info(&mut self, text: impl Into<String>) -> NoticeId {
        self.push(NoticeKind::Info, text, Instant::now())
    }

    /// Push an error notice stamped now.
    pub fn error(&mut self, text: impl Into<String>) -> NoticeId {
        self.push(NoticeKind::Error, text, Instant::now())
    }

    /// Report a failed action.
    pub fn report(&mut self, err: &AppError) -> NoticeId {
        self.error(err.to_string())
    }

    /// Pending notices, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    /// Number of pending notices.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn identical_notices_within_window_collapse() {
        let mut board = NoticeBoard::new(8);
        let t0 = Instant::now();
        let a = board.push(NoticeKind::Error, "boom", t0);
        let b = board.push(NoticeKind::Error, "boom", t0 + Duration::from_millis(100));
        assert_eq!(a, b);
        assert_eq!(board.len(), 1);
        let c = board.push(NoticeKind::Info, "boom", t0 + Duration::from_millis(200));
        assert_ne!(a, c);
        let d = board.push(NoticeKind::Error, "boom", t0 + Duration::from_secs(5));
        assert_ne!(a, d);
        assert_eq!(board.len(), 3);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut board = NoticeBoard::new(2);
        let t0 = Instant::now();
        board.push(NoticeKind::Info, "one", t0);
        board.push(NoticeKind::Info, "two", t0);
        board.push(NoticeKind::Info, "three", t0);
        let texts: Vec<_> = board.drain().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, ["two", "three"]);
        assert!(board.is_empty());
    }

    #[test]
    fn report_uses_error_display() {
        let mut board = NoticeBoard::default();
        board.report(&AppError::Connection("Not connected to real-time server.".into()));
        let n = board.drain().remove(0);
        assert_eq!(n.kind, NoticeKind::Error);
        assert!(n.text.contains("Not connected"));
    }
}
