//! Registry of connected input devices and the current display layout.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use mmi_core::domain::{DeviceId, DeviceTags, InputDevice, SourceType};
use mmi_core::DisplayGroupInfo;
use tracing::info;

/// Devices announced by the input source, by id.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<DeviceId, InputDevice>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, device: InputDevice) {
        info!(device_id = device.id, name = %device.name, "input device added");
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device.id, device);
    }

    pub fn remove(&self, device_id: DeviceId) -> Option<InputDevice> {
        let removed = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&device_id);
        if removed.is_some() {
            info!(device_id, "input device removed");
        }
        removed
    }

    pub fn get(&self, device_id: DeviceId) -> Option<InputDevice> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device_id)
            .cloned()
    }

    pub fn all(&self) -> Vec<InputDevice> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Capabilities used to filter handlers for an event from `device_id`.
    ///
    /// Injected events and events from unannounced devices fall back to
    /// the capabilities implied by `fallback`.
    pub fn capabilities(&self, device_id: DeviceId, fallback: DeviceTags) -> DeviceTags {
        self.get(device_id).map(|d| d.capabilities).unwrap_or(fallback)
    }

    pub fn pointer_capabilities(&self, device_id: DeviceId, source: SourceType) -> DeviceTags {
        self.capabilities(device_id, DeviceTags::for_source(source))
    }
}

/// Latest display group reported by the window manager.
#[derive(Default)]
pub struct DisplayState {
    info: RwLock<DisplayGroupInfo>,
}

impl DisplayState {
    pub fn new(info: DisplayGroupInfo) -> Self {
        Self {
            info: RwLock::new(info),
        }
    }

    pub fn snapshot(&self) -> DisplayGroupInfo {
        self.info.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update(&self, info: DisplayGroupInfo) {
        info!(
            windows = info.windows.len(),
            displays = info.displays.len(),
            focus_window_id = info.focus_window_id,
            "display info updated"
        );
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = info;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_fall_back_for_unknown_device() {
        // Arrange
        let registry = DeviceRegistry::new();
        registry.add(InputDevice {
            id: 3,
            name: "touch".to_string(),
            capabilities: DeviceTags(DeviceTags::TOUCH | DeviceTags::POINTER),
        });

        // Act
        let known = registry.pointer_capabilities(3, SourceType::TouchScreen);
        let unknown = registry.pointer_capabilities(99, SourceType::Joystick);

        // Assert
        assert_eq!(known, DeviceTags(DeviceTags::TOUCH | DeviceTags::POINTER));
        assert_eq!(unknown, DeviceTags(DeviceTags::JOYSTICK));
    }

    #[test]
    fn test_remove_returns_device_once() {
        let registry = DeviceRegistry::new();
        registry.add(InputDevice {
            id: 1,
            name: "kbd".to_string(),
            capabilities: DeviceTags::keyboard(),
        });

        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn test_display_state_update_replaces_snapshot() {
        let state = DisplayState::default();
        let info = DisplayGroupInfo {
            width: 10,
            height: 20,
            focus_window_id: 3,
            ..DisplayGroupInfo::default()
        };

        state.update(info.clone());

        assert_eq!(state.snapshot(), info);
    }
}
