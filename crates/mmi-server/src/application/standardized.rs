//! Standardized-event registrations.
//!
//! A client registers `(window id, message id)` pairs for the semantic
//! events it wants.  When the service produces such an event it sends
//! `OnStandardizedEvent` to every registered window; the client runtime
//! maps the message id back to its handlers.
//!
//! The service itself produces only the device lifecycle events
//! [`DEVICE_ADDED`] and [`DEVICE_REMOVED`].

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmi_core::domain::DeviceId;
use mmi_core::MmiMessage;
use tracing::{debug, info, warn};

use super::session::{send_message, SessionId, SessionLostListener, SessionTransmitter};

/// Lowest message id of a standardized event.
pub const STANDARDIZED_MESSAGE_ID_MIN: i32 = 1;
/// An input device was plugged in.
pub const DEVICE_ADDED: i32 = 7001;
/// An input device went away.
pub const DEVICE_REMOVED: i32 = 7002;

pub struct StandardizedRegistry {
    transmitter: Arc<dyn SessionTransmitter>,
    /// `(session, window id, message id)`.
    registrations: Mutex<BTreeSet<(SessionId, i32, i32)>>,
}

impl StandardizedRegistry {
    pub fn new(transmitter: Arc<dyn SessionTransmitter>) -> Self {
        Self {
            transmitter,
            registrations: Mutex::new(BTreeSet::new()),
        }
    }

    /// Records the pair; registering it twice is not an error.
    ///
    /// Returns `false` if `message_id` is not a standardized event id.
    pub fn register(&self, session: SessionId, window_id: i32, message_id: i32) -> bool {
        if message_id < STANDARDIZED_MESSAGE_ID_MIN {
            return false;
        }
        if self.lock().insert((session, window_id, message_id)) {
            debug!(session, window_id, message_id, "standardized event registered");
        }
        true
    }

    /// Returns `false` if the pair was not registered.
    pub fn unregister(&self, session: SessionId, window_id: i32, message_id: i32) -> bool {
        let removed = self.lock().remove(&(session, window_id, message_id));
        if removed {
            debug!(session, window_id, message_id, "standardized event unregistered");
        }
        removed
    }

    /// Number of registrations held for `session`.
    pub fn count_for(&self, session: SessionId) -> usize {
        self.lock().iter().filter(|(s, _, _)| *s == session).count()
    }

    /// Sends `message_id` to every window registered for it; returns how
    /// many sends succeeded.
    pub fn notify(&self, message_id: i32, device_id: DeviceId) -> usize {
        let targets: Vec<(SessionId, i32)> = self
            .lock()
            .iter()
            .filter(|(_, _, id)| *id == message_id)
            .map(|&(session, window_id, _)| (session, window_id))
            .collect();

        let mut delivered = 0;
        for (session, window_id) in targets {
            let msg = MmiMessage::OnStandardizedEvent {
                window_id,
                message_id,
                device_id,
            };
            if send_message(self.transmitter.as_ref(), session, &msg) {
                delivered += 1;
            } else {
                warn!(session, window_id, message_id, "failed to deliver standardized event");
            }
        }
        debug!(message_id, device_id, delivered, "standardized event notified");
        delivered
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<(SessionId, i32, i32)>> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLostListener for StandardizedRegistry {
    fn on_session_lost(&self, session: SessionId) {
        let mut regs = self.lock();
        let before = regs.len();
        regs.retain(|(s, _, _)| *s != session);
        if regs.len() != before {
            info!(session, "standardized registrations purged for lost session");
        }
    }
}
