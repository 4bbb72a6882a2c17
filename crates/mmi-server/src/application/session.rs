//! Ports between the application layer and the session transport.
//!
//! Registries never own sessions.  They keep a [`SessionId`] key and rely on
//! the transport to announce a closed session through
//! [`SessionLostListener::on_session_lost`], at which point each registry
//! purges its own entries.

use mmi_core::protocol::TokenType;
use mmi_core::{encode_message, MmiMessage, NetPacket};
use tracing::warn;

/// Server-side handle of one client connection (the socket descriptor).
pub type SessionId = i32;

/// What the transport knows about a connected client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session: SessionId,
    pub program_name: String,
    pub module_type: i32,
    pub token_type: TokenType,
    pub pid: i32,
    pub uid: i32,
}

/// Outbound half of the session transport.
///
/// Infrastructure implementation writes to sockets; tests record packets.
pub trait SessionTransmitter: Send + Sync {
    /// Sends `pkt` to `session`.  Returns `false` if the session is unknown
    /// or the write failed; callers treat that as "client gone".
    fn send_msg(&self, session: SessionId, pkt: &NetPacket) -> bool;

    fn session_info(&self, session: SessionId) -> Option<SessionInfo>;

    /// Session registered for process `pid`, if any.
    fn session_for_pid(&self, pid: i32) -> Option<SessionId>;
}

/// Notified by the transport after a session has been released.
pub trait SessionLostListener: Send + Sync {
    fn on_session_lost(&self, session: SessionId);
}

/// Inbound half: receives every decoded request after `Connect`.
pub trait PacketHandler: Send + Sync {
    fn on_packet(&self, session: SessionId, msg: MmiMessage);
}

/// Encodes `msg` and sends it; logs and returns `false` on failure.
pub fn send_message(tx: &dyn SessionTransmitter, session: SessionId, msg: &MmiMessage) -> bool {
    let pkt = encode_message(msg);
    if pkt.chk_rw_error() {
        warn!(session, msg_id = ?msg.message_id(), "failed to encode message");
        return false;
    }
    tx.send_msg(session, &pkt)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Recording transmitter shared by the application tests.

    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    use mmi_core::{decode_message, MmiMessage, NetPacket};

    use super::*;

    #[derive(Default)]
    pub struct RecordingTransmitter {
        pub sent: Mutex<Vec<(SessionId, MmiMessage)>>,
        pub sessions: Mutex<HashMap<SessionId, SessionInfo>>,
        /// Sessions whose sends fail.
        pub failing: Mutex<Vec<SessionId>>,
    }

    impl RecordingTransmitter {
        pub fn with_sessions(sessions: &[(SessionId, i32)]) -> Self {
            let tx = Self::default();
            for &(session, pid) in sessions {
                tx.add_session(session, pid);
            }
            tx
        }

        pub fn add_session(&self, session: SessionId, pid: i32) {
            self.sessions.lock().unwrap_or_else(PoisonError::into_inner).insert(
                session,
                SessionInfo {
                    session,
                    program_name: format!("app-{pid}"),
                    module_type: 0,
                    token_type: TokenType::Hap,
                    pid,
                    uid: 20_000 + pid,
                },
            );
        }

        pub fn remove_session(&self, session: SessionId) {
            self.sessions.lock().unwrap_or_else(PoisonError::into_inner).remove(&session);
        }

        pub fn fail_sends_to(&self, session: SessionId) {
            self.failing.lock().unwrap_or_else(PoisonError::into_inner).push(session);
        }

        pub fn sent(&self) -> Vec<(SessionId, MmiMessage)> {
            self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        pub fn sent_to(&self, session: SessionId) -> Vec<MmiMessage> {
            self.sent()
                .into_iter()
                .filter(|(s, _)| *s == session)
                .map(|(_, m)| m)
                .collect()
        }
    }

    impl SessionTransmitter for RecordingTransmitter {
        fn send_msg(&self, session: SessionId, pkt: &NetPacket) -> bool {
            if !self.sessions.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&session) {
                return false;
            }
            if self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(&session) {
                return false;
            }
            let msg = decode_message(pkt.clone()).expect("recorded packet must decode");
            self.sent.lock().unwrap_or_else(PoisonError::into_inner).push((session, msg));
            true
        }

        fn session_info(&self, session: SessionId) -> Option<SessionInfo> {
            self.sessions.lock().unwrap_or_else(PoisonError::into_inner).get(&session).cloned()
        }

        fn session_for_pid(&self, pid: i32) -> Option<SessionId> {
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .find(|i| i.pid == pid)
                .map(|i| i.session)
        }
    }
}
