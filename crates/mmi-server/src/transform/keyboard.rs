//! Keyboard processor.
//!
//! Produces [`KeyEvent`]s rather than pointer events, so it does not
//! implement [`super::TransformProcessor`].  Like the pointer processors it
//! keeps one running event per device: the item list is the set of keys
//! held down, and a released key stays in the list only for the `UP` event
//! that reports it.

use mmi_core::domain::{DeviceId, KeyAction, KeyEvent, KeyItem};
use mmi_core::keymap::KeyMapper;
use mmi_core::KeyCode;
use tracing::debug;

use super::TransformError;
use crate::infrastructure::input_source::RawInputEvent;

pub struct KeyTransformProcessor {
    device_id: DeviceId,
    key_event: KeyEvent,
}

impl KeyTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut key_event = KeyEvent::new();
        key_event.device_id = device_id;
        Self {
            device_id,
            key_event,
        }
    }

    /// Applies a key sample; `None` when the key has no logical mapping or
    /// a release arrives for a key that is not held.
    pub fn normalize(&mut self, raw: &RawInputEvent) -> Result<Option<KeyAction>, TransformError> {
        let RawInputEvent::KeyboardKey {
            code,
            pressed,
            time_us,
            ..
        } = *raw
        else {
            return Err(TransformError::Unsupported("keyboard"));
        };

        let key_code = KeyMapper::evdev_to_key_code(code);
        if key_code == KeyCode::Unknown.code() {
            debug!(device_id = self.device_id, code, "unmapped key ignored");
            return Ok(None);
        }

        let event = &mut self.key_event;
        event.remove_released_key_items();
        let held = event.key_item(key_code).map(|i| i.down_time);
        if !pressed && held.is_none() {
            debug!(device_id = self.device_id, key_code, "release of key that is not held");
            return Ok(None);
        }

        event.update_key_item(KeyItem {
            key_code,
            // Auto-repeat keeps the original down time.
            down_time: held.unwrap_or(time_us),
            pressed,
            device_id: self.device_id,
        });
        event.key_code = key_code;
        event.key_action = if pressed { KeyAction::Down } else { KeyAction::Up };
        event.action_time = time_us;
        Ok(Some(event.key_action))
    }

    pub fn key_event(&self) -> &KeyEvent {
        &self.key_event
    }
}
