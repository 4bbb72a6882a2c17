//! Server-side ANR (application not responding) bookkeeping.
//!
//! Every event sent to a client window or monitor is recorded with its send
//! time, per session and per [`AnrEventType`].  The client acknowledges with
//! `MarkProcessed(type, id)`, which clears every pending entry up to `id`.
//!
//! Before the next send, [`AnrManager::trigger_anr`] looks at the oldest
//! pending entry.  Once it is older than the UI timeout the session is
//! flagged, the [`AnrObserver`] hears about it once, and sends to that
//! session are skipped until the client catches up.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mmi_core::domain::AnrEventType;
use tracing::{debug, warn};

use super::session::{SessionId, SessionLostListener};

/// Told when a session stops acknowledging events in time.
pub trait AnrObserver: Send + Sync {
    fn on_anr(&self, session: SessionId, anr_type: AnrEventType, pending_since_us: i64);
}

/// Default observer: logs the fault.
#[derive(Debug, Default)]
pub struct LoggingAnrObserver;

impl AnrObserver for LoggingAnrObserver {
    fn on_anr(&self, session: SessionId, anr_type: AnrEventType, pending_since_us: i64) {
        warn!(session, ?anr_type, pending_since_us, "application not responding");
    }
}

#[derive(Debug, Default)]
struct SessionAnr {
    /// `(event_id, sent_time_us)` per event type, oldest first.
    pending: [VecDeque<(i32, i64)>; 2],
    flagged: bool,
}

impl SessionAnr {
    fn is_idle(&self) -> bool {
        self.pending.iter().all(VecDeque::is_empty)
    }
}

pub struct AnrManager {
    sessions: Mutex<HashMap<SessionId, SessionAnr>>,
    ui_timeout_us: i64,
    observer: Arc<dyn AnrObserver>,
}

impl AnrManager {
    pub fn new(ui_timeout: Duration, observer: Arc<dyn AnrObserver>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ui_timeout_us: i64::try_from(ui_timeout.as_micros()).unwrap_or(i64::MAX),
            observer,
        }
    }

    /// Records that `event_id` was sent to `session` at `now_us`.
    pub fn record(&self, session: SessionId, anr_type: AnrEventType, event_id: i32, now_us: i64) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session)
            .or_default()
            .pending[anr_type.index()]
            .push_back((event_id, now_us));
    }

    /// Clears every pending entry of `anr_type` with an id up to `event_id`.
    pub fn mark_processed(&self, session: SessionId, anr_type: AnrEventType, event_id: i32) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = sessions.get_mut(&session) else {
            debug!(session, event_id, "mark processed for session without pending events");
            return;
        };
        let queue = &mut state.pending[anr_type.index()];
        while queue.front().is_some_and(|(id, _)| *id <= event_id) {
            queue.pop_front();
        }
        if state.flagged {
            debug!(session, ?anr_type, event_id, "session responding again");
        }
        state.flagged = false;
        if state.is_idle() {
            sessions.remove(&session);
        }
    }

    /// Returns `true` if `session` is not responding and the send should be skipped.
    pub fn trigger_anr(&self, session: SessionId, anr_type: AnrEventType, now_us: i64) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = sessions.get_mut(&session) else {
            return false;
        };
        if state.flagged {
            return true;
        }
        let Some(&(event_id, sent_us)) = state.pending[anr_type.index()].front() else {
            return false;
        };
        if now_us.saturating_sub(sent_us) < self.ui_timeout_us {
            return false;
        }
        state.flagged = true;
        drop(sessions);
        debug!(session, ?anr_type, event_id, "ui timeout exceeded");
        self.observer.on_anr(session, anr_type, sent_us);
        true
    }

    pub fn pending_count(&self, session: SessionId, anr_type: AnrEventType) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
            .map(|s| s.pending[anr_type.index()].len())
            .unwrap_or(0)
    }
}

impl SessionLostListener for AnrManager {
    fn on_session_lost(&self, session: SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
    }
}
