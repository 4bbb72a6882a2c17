//! Canonical key event model.

use serde::{Deserialize, Serialize};

use super::pointer_event::DeviceId;

/// Key code value carried when a physical key has no logical mapping.
pub const KEY_CODE_UNKNOWN: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum KeyAction {
    Unknown = 0,
    Cancel = 1,
    Down = 2,
    Up = 3,
}

impl TryFrom<i32> for KeyAction {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Cancel),
            2 => Ok(Self::Down),
            3 => Ok(Self::Up),
            _ => Err(()),
        }
    }
}

/// One key tracked by a [`KeyEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyItem {
    pub key_code: i32,
    /// Microseconds.
    pub down_time: i64,
    pub pressed: bool,
    pub device_id: DeviceId,
}

/// A normalized key sample together with every key currently held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Event id assigned by the service; `-1` until assigned.
    pub id: i32,
    pub device_id: DeviceId,
    pub key_code: i32,
    pub key_action: KeyAction,
    items: Vec<KeyItem>,
    /// Microseconds.
    pub action_time: i64,
    pub target_window_id: i32,
}

impl KeyEvent {
    pub fn new() -> Self {
        Self {
            id: -1,
            device_id: -1,
            key_code: KEY_CODE_UNKNOWN,
            key_action: KeyAction::Unknown,
            items: Vec::new(),
            action_time: 0,
            target_window_id: -1,
        }
    }

    /// Replaces the item with the same key code, or appends it.
    pub fn update_key_item(&mut self, item: KeyItem) {
        match self.items.iter_mut().find(|i| i.key_code == item.key_code) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn key_item(&self, key_code: i32) -> Option<&KeyItem> {
        self.items.iter().find(|i| i.key_code == key_code)
    }

    pub fn key_items(&self) -> &[KeyItem] {
        &self.items
    }

    /// Drops items for keys that have been released.
    pub fn remove_released_key_items(&mut self) {
        self.items.retain(|i| i.pressed);
    }

    /// Codes of all keys currently held, in press order.
    pub fn pressed_keys(&self) -> Vec<i32> {
        self.items
            .iter()
            .filter(|i| i.pressed)
            .map(|i| i.key_code)
            .collect()
    }

    /// Returns `true` when the event names a known key and action and the
    /// item for that key agrees with the action.
    pub fn is_valid(&self) -> bool {
        if self.key_code == KEY_CODE_UNKNOWN {
            return false;
        }
        match self.key_action {
            KeyAction::Unknown => false,
            KeyAction::Down => self.key_item(self.key_code).is_some_and(|i| i.pressed),
            KeyAction::Up => self.key_item(self.key_code).is_some_and(|i| !i.pressed),
            KeyAction::Cancel => true,
        }
    }
}

impl Default for KeyEvent {
    fn default() -> Self {
        Self::new()
    }
}
