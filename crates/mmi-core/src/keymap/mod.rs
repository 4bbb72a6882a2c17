//! Key and button code translation tables.
//!
//! The canonical key representation is the logical [`KeyCode`].  Kernel
//! evdev codes are translated at the normalization boundary.

pub mod evdev;
pub mod keycode;

pub use keycode::KeyCode;

/// Unified mapper over the translation tables.
pub struct KeyMapper;

impl KeyMapper {
    /// Translates an evdev key code to a logical key code value.
    ///
    /// Returns [`KeyCode::Unknown`]'s value (-1) if no mapping exists.
    pub fn evdev_to_key_code(code: u32) -> i32 {
        evdev::evdev_to_key_code(code).code()
    }

    /// Translates an evdev pointer button code to a mouse button id.
    pub fn evdev_to_mouse_button(code: u32) -> i32 {
        evdev::evdev_to_mouse_button(code)
    }

    /// Translates an evdev gamepad/joystick button code to a joystick button id.
    pub fn evdev_to_joystick_button(code: u32) -> i32 {
        evdev::evdev_to_joystick_button(code)
    }
}
