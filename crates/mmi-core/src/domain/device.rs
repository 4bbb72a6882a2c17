//! Input device descriptors and hot-key patterns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::handler::DeviceTags;
use super::pointer_event::DeviceId;

/// A connected input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub id: DeviceId,
    pub name: String,
    pub capabilities: DeviceTags,
}

impl InputDevice {
    pub fn has_capability(&self, capability: u32) -> bool {
        self.capabilities.0 & capability != 0
    }
}

/// A key combination a client subscribes to.
///
/// Matches when every key in `pre_keys` is held, no other key is held, and
/// `final_key` goes down (or up, when `final_key_down` is `false`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyOption {
    pub pre_keys: BTreeSet<i32>,
    pub final_key: i32,
    pub final_key_down: bool,
}
