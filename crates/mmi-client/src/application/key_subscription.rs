//! Hot-key subscriptions.
//!
//! The client allocates subscribe ids from a counter that only moves
//! forward.  Ids are never reused within a connection; running out of them
//! is a resource-exhaustion error rather than a wrap-around.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use mmi_core::domain::KeyOption;
use mmi_core::{KeyEvent, MmiMessage};
use tracing::{debug, warn};

use super::sender::{ClientError, MessageSender};

/// Called with the key event that completed a subscribed combination.
pub type KeyCallback = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

struct Subscription {
    option: KeyOption,
    callback: KeyCallback,
}

struct State {
    next_id: i32,
    subscriptions: BTreeMap<i32, Subscription>,
}

pub struct KeySubscriptionManager {
    sender: Arc<dyn MessageSender>,
    state: Mutex<State>,
}

impl KeySubscriptionManager {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self::starting_at(sender, 0)
    }

    fn starting_at(sender: Arc<dyn MessageSender>, next_id: i32) -> Self {
        Self {
            sender,
            state: Mutex::new(State {
                next_id,
                subscriptions: BTreeMap::new(),
            }),
        }
    }

    /// Subscribes to `option`; returns the subscribe id.
    pub async fn subscribe(&self, option: KeyOption, callback: KeyCallback) -> Result<i32, ClientError> {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            if id == i32::MAX {
                return Err(ClientError::ResourceExhausted);
            }
            state.next_id = id + 1;
            state.subscriptions.insert(
                id,
                Subscription {
                    option: option.clone(),
                    callback,
                },
            );
            id
        };

        let msg = MmiMessage::SubscribeKeyEvent {
            subscribe_id: id,
            option,
        };
        if let Err(e) = self.sender.request(&msg).await {
            self.lock().subscriptions.remove(&id);
            return Err(e);
        }
        debug!(subscribe_id = id, "key subscription added");
        Ok(id)
    }

    pub async fn unsubscribe(&self, subscribe_id: i32) -> Result<(), ClientError> {
        if self.lock().subscriptions.remove(&subscribe_id).is_none() {
            return Err(ClientError::SubscriptionNotFound(subscribe_id));
        }
        self.sender
            .request(&MmiMessage::UnsubscribeKeyEvent { subscribe_id })
            .await
    }

    /// Runs the callback of `subscribe_id`.  Returns `false` for an id
    /// this client does not hold.
    pub fn on_subscribe_key_event(&self, subscribe_id: i32, event: &KeyEvent) -> bool {
        let callback = self
            .lock()
            .subscriptions
            .get(&subscribe_id)
            .map(|s| Arc::clone(&s.callback));
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => {
                warn!(subscribe_id, "key event for unknown subscription");
                false
            }
        }
    }

    pub fn option(&self, subscribe_id: i32) -> Option<KeyOption> {
        self.lock().subscriptions.get(&subscribe_id).map(|s| s.option.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
