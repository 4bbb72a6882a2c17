//! Hot-key subscriptions.
//!
//! A client subscribes with an id of its choosing and a [`KeyOption`]
//! pattern.  Key events that match any subscription are delivered as
//! `OnSubscribeKeyEvent` and do not reach the focused window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmi_core::domain::{KeyAction, KeyOption};
use mmi_core::{KeyEvent, MmiMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::session::{send_message, SessionId, SessionLostListener, SessionTransmitter};

/// Error type for key subscriptions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("subscribe id {0} is invalid")]
    InvalidId(i32),
    #[error("subscribe id {0} already in use by this session")]
    Duplicate(i32),
    #[error("no subscription {0} for this session")]
    NotFound(i32),
}

impl SubscribeError {
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidId(_) => -1,
            Self::Duplicate(_) => -5,
            Self::NotFound(_) => -3,
        }
    }
}

#[derive(Debug, Clone)]
struct Subscriber {
    session: SessionId,
    subscribe_id: i32,
    option: KeyOption,
}

/// Returns `true` if `event` completes the pattern in `option`.
///
/// The final key must be the key of the event with the wanted direction,
/// every pre-key must be held, and no other key may be held.
pub fn matches_option(option: &KeyOption, event: &KeyEvent) -> bool {
    if event.key_code != option.final_key {
        return false;
    }
    let wanted = if option.final_key_down { KeyAction::Down } else { KeyAction::Up };
    if event.key_action != wanted {
        return false;
    }
    let held: Vec<i32> = event
        .pressed_keys()
        .into_iter()
        .filter(|k| *k != option.final_key)
        .collect();
    held.len() == option.pre_keys.len() && held.iter().all(|k| option.pre_keys.contains(k))
}

pub struct KeySubscriberRegistry {
    subscribers: Mutex<Vec<Subscriber>>,
    transmitter: Arc<dyn SessionTransmitter>,
}

impl KeySubscriberRegistry {
    pub fn new(transmitter: Arc<dyn SessionTransmitter>) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            transmitter,
        }
    }

    pub fn subscribe(&self, session: SessionId, subscribe_id: i32, option: KeyOption) -> Result<(), SubscribeError> {
        if subscribe_id < 0 {
            return Err(SubscribeError::InvalidId(subscribe_id));
        }
        let mut subs = self.lock();
        if subs.iter().any(|s| s.session == session && s.subscribe_id == subscribe_id) {
            return Err(SubscribeError::Duplicate(subscribe_id));
        }
        info!(session, subscribe_id, final_key = option.final_key, "key subscription added");
        subs.push(Subscriber {
            session,
            subscribe_id,
            option,
        });
        Ok(())
    }

    pub fn unsubscribe(&self, session: SessionId, subscribe_id: i32) -> Result<(), SubscribeError> {
        let mut subs = self.lock();
        let pos = subs
            .iter()
            .position(|s| s.session == session && s.subscribe_id == subscribe_id)
            .ok_or(SubscribeError::NotFound(subscribe_id))?;
        subs.remove(pos);
        info!(session, subscribe_id, "key subscription removed");
        Ok(())
    }

    /// Delivers `event` to every matching subscription; returns `true` if any matched.
    pub fn handle_key_event(&self, event: &KeyEvent) -> bool {
        let matched: Vec<(SessionId, i32)> = self
            .lock()
            .iter()
            .filter(|s| matches_option(&s.option, event))
            .map(|s| (s.session, s.subscribe_id))
            .collect();

        for &(session, subscribe_id) in &matched {
            let msg = MmiMessage::OnSubscribeKeyEvent {
                subscribe_id,
                event: event.clone(),
            };
            if send_message(self.transmitter.as_ref(), session, &msg) {
                debug!(session, subscribe_id, event_id = event.id, "hot key delivered");
            } else {
                warn!(session, subscribe_id, "failed to deliver hot key");
            }
        }
        !matched.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLostListener for KeySubscriberRegistry {
    fn on_session_lost(&self, session: SessionId) {
        self.lock().retain(|s| s.session != session);
    }
}
