//! Linux evdev code translation tables.
//!
//! Raw events from the kernel input layer carry evdev codes as defined in
//! `linux/input-event-codes.h`.  Keyboard keys live below `0x100`; pointer
//! buttons start at `BTN_MOUSE` (`0x110`) and gamepad/joystick buttons at
//! `BTN_JOYSTICK` (`0x120`) and `BTN_GAMEPAD` (`0x130`).
//!
//! Reference: https://github.com/torvalds/linux/blob/master/include/uapi/linux/input-event-codes.h

use super::keycode::KeyCode;
use crate::domain::PointerEvent;

pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;
pub const BTN_SIDE: u32 = 0x113;
pub const BTN_EXTRA: u32 = 0x114;
pub const BTN_FORWARD: u32 = 0x115;
pub const BTN_BACK: u32 = 0x116;
pub const BTN_TASK: u32 = 0x117;

/// Translates an evdev key code to a logical [`KeyCode`].
///
/// Returns [`KeyCode::Unknown`] if the key has no mapping.
pub fn evdev_to_key_code(code: u32) -> KeyCode {
    match code {
        1 => KeyCode::Escape,        // KEY_ESC
        2 => KeyCode::Digit1,        // KEY_1
        3 => KeyCode::Digit2,        // KEY_2
        4 => KeyCode::Digit3,        // KEY_3
        5 => KeyCode::Digit4,        // KEY_4
        6 => KeyCode::Digit5,        // KEY_5
        7 => KeyCode::Digit6,        // KEY_6
        8 => KeyCode::Digit7,        // KEY_7
        9 => KeyCode::Digit8,        // KEY_8
        10 => KeyCode::Digit9,       // KEY_9
        11 => KeyCode::Digit0,       // KEY_0
        12 => KeyCode::Minus,        // KEY_MINUS
        13 => KeyCode::Equals,       // KEY_EQUAL
        14 => KeyCode::Del,          // KEY_BACKSPACE
        15 => KeyCode::Tab,          // KEY_TAB
        16 => KeyCode::Q,            // KEY_Q
        17 => KeyCode::W,            // KEY_W
        18 => KeyCode::E,            // KEY_E
        19 => KeyCode::R,            // KEY_R
        20 => KeyCode::T,            // KEY_T
        21 => KeyCode::Y,            // KEY_Y
        22 => KeyCode::U,            // KEY_U
        23 => KeyCode::I,            // KEY_I
        24 => KeyCode::O,            // KEY_O
        25 => KeyCode::P,            // KEY_P
        26 => KeyCode::LeftBracket,  // KEY_LEFTBRACE
        27 => KeyCode::RightBracket, // KEY_RIGHTBRACE
        28 => KeyCode::Enter,        // KEY_ENTER
        29 => KeyCode::CtrlLeft,     // KEY_LEFTCTRL
        30 => KeyCode::A,            // KEY_A
        31 => KeyCode::S,            // KEY_S
        32 => KeyCode::D,            // KEY_D
        33 => KeyCode::F,            // KEY_F
        34 => KeyCode::G,            // KEY_G
        35 => KeyCode::H,            // KEY_H
        36 => KeyCode::J,            // KEY_J
        37 => KeyCode::K,            // KEY_K
        38 => KeyCode::L,            // KEY_L
        39 => KeyCode::Semicolon,    // KEY_SEMICOLON
        40 => KeyCode::Apostrophe,   // KEY_APOSTROPHE
        41 => KeyCode::Grave,        // KEY_GRAVE
        42 => KeyCode::ShiftLeft,    // KEY_LEFTSHIFT
        43 => KeyCode::Backslash,    // KEY_BACKSLASH
        44 => KeyCode::Z,            // KEY_Z
        45 => KeyCode::X,            // KEY_X
        46 => KeyCode::C,            // KEY_C
        47 => KeyCode::V,            // KEY_V
        48 => KeyCode::B,            // KEY_B
        49 => KeyCode::N,            // KEY_N
        50 => KeyCode::M,            // KEY_M
        51 => KeyCode::Comma,        // KEY_COMMA
        52 => KeyCode::Period,       // KEY_DOT
        53 => KeyCode::Slash,        // KEY_SLASH
        54 => KeyCode::ShiftRight,   // KEY_RIGHTSHIFT
        56 => KeyCode::AltLeft,      // KEY_LEFTALT
        57 => KeyCode::Space,        // KEY_SPACE
        58 => KeyCode::CapsLock,     // KEY_CAPSLOCK
        59 => KeyCode::F1,           // KEY_F1
        60 => KeyCode::F2,           // KEY_F2
        61 => KeyCode::F3,           // KEY_F3
        62 => KeyCode::F4,           // KEY_F4
        63 => KeyCode::F5,           // KEY_F5
        64 => KeyCode::F6,           // KEY_F6
        65 => KeyCode::F7,           // KEY_F7
        66 => KeyCode::F8,           // KEY_F8
        67 => KeyCode::F9,           // KEY_F9
        68 => KeyCode::F10,          // KEY_F10
        69 => KeyCode::NumLock,      // KEY_NUMLOCK
        70 => KeyCode::ScrollLock,   // KEY_SCROLLLOCK
        87 => KeyCode::F11,          // KEY_F11
        88 => KeyCode::F12,          // KEY_F12
        97 => KeyCode::CtrlRight,    // KEY_RIGHTCTRL
        99 => KeyCode::Sysrq,        // KEY_SYSRQ
        100 => KeyCode::AltRight,    // KEY_RIGHTALT
        102 => KeyCode::MoveHome,    // KEY_HOME
        103 => KeyCode::DpadUp,      // KEY_UP
        104 => KeyCode::PageUp,      // KEY_PAGEUP
        105 => KeyCode::DpadLeft,    // KEY_LEFT
        106 => KeyCode::DpadRight,   // KEY_RIGHT
        107 => KeyCode::MoveEnd,     // KEY_END
        108 => KeyCode::DpadDown,    // KEY_DOWN
        109 => KeyCode::PageDown,    // KEY_PAGEDOWN
        110 => KeyCode::Insert,      // KEY_INSERT
        111 => KeyCode::ForwardDel,  // KEY_DELETE
        113 => KeyCode::VolumeMute,  // KEY_MUTE
        114 => KeyCode::VolumeDown,  // KEY_VOLUMEDOWN
        115 => KeyCode::VolumeUp,    // KEY_VOLUMEUP
        116 => KeyCode::Power,       // KEY_POWER
        119 => KeyCode::Break,       // KEY_PAUSE
        125 => KeyCode::MetaLeft,    // KEY_LEFTMETA
        126 => KeyCode::MetaRight,   // KEY_RIGHTMETA
        158 => KeyCode::Back,        // KEY_BACK
        172 => KeyCode::Home,        // KEY_HOMEPAGE
        _ => KeyCode::Unknown,
    }
}

/// Translates an evdev pointer button code to a logical mouse button id.
///
/// Returns [`PointerEvent::BUTTON_NONE`] for codes outside the mouse range.
pub fn evdev_to_mouse_button(code: u32) -> i32 {
    match code {
        BTN_LEFT => PointerEvent::MOUSE_BUTTON_LEFT,
        BTN_RIGHT => PointerEvent::MOUSE_BUTTON_RIGHT,
        BTN_MIDDLE => PointerEvent::MOUSE_BUTTON_MIDDLE,
        BTN_SIDE => PointerEvent::MOUSE_BUTTON_SIDE,
        BTN_EXTRA => PointerEvent::MOUSE_BUTTON_EXTRA,
        BTN_FORWARD => PointerEvent::MOUSE_BUTTON_FORWARD,
        BTN_BACK => PointerEvent::MOUSE_BUTTON_BACK,
        BTN_TASK => PointerEvent::MOUSE_BUTTON_TASK,
        _ => PointerEvent::BUTTON_NONE,
    }
}

/// Translates an evdev joystick/gamepad button code to a logical button id.
///
/// Returns [`PointerEvent::BUTTON_NONE`] for unmapped codes.
pub fn evdev_to_joystick_button(code: u32) -> i32 {
    match code {
        0x120 => PointerEvent::JOYSTICK_BUTTON_TRIGGER, // BTN_TRIGGER
        0x121 => PointerEvent::JOYSTICK_BUTTON_THUMB,   // BTN_THUMB
        0x122 => PointerEvent::JOYSTICK_BUTTON_THUMB2,  // BTN_THUMB2
        0x123 => PointerEvent::JOYSTICK_BUTTON_TOP,     // BTN_TOP
        0x124 => PointerEvent::JOYSTICK_BUTTON_TOP2,    // BTN_TOP2
        0x125 => PointerEvent::JOYSTICK_BUTTON_PINKIE,  // BTN_PINKIE
        0x126 => PointerEvent::JOYSTICK_BUTTON_BASE,    // BTN_BASE
        0x130 => PointerEvent::JOYSTICK_BUTTON_A,       // BTN_SOUTH
        0x131 => PointerEvent::JOYSTICK_BUTTON_B,       // BTN_EAST
        0x132 => PointerEvent::JOYSTICK_BUTTON_C,       // BTN_C
        0x133 => PointerEvent::JOYSTICK_BUTTON_X,       // BTN_NORTH
        0x134 => PointerEvent::JOYSTICK_BUTTON_Y,       // BTN_WEST
        0x135 => PointerEvent::JOYSTICK_BUTTON_Z,       // BTN_Z
        0x136 => PointerEvent::JOYSTICK_BUTTON_TL,      // BTN_TL
        0x137 => PointerEvent::JOYSTICK_BUTTON_TR,      // BTN_TR
        0x138 => PointerEvent::JOYSTICK_BUTTON_TL2,     // BTN_TL2
        0x139 => PointerEvent::JOYSTICK_BUTTON_TR2,     // BTN_TR2
        0x13A => PointerEvent::JOYSTICK_BUTTON_SELECT,  // BTN_SELECT
        0x13B => PointerEvent::JOYSTICK_BUTTON_START,   // BTN_START
        0x13C => PointerEvent::JOYSTICK_BUTTON_MODE,    // BTN_MODE
        0x13D => PointerEvent::JOYSTICK_BUTTON_THUMBL,  // BTN_THUMBL
        0x13E => PointerEvent::JOYSTICK_BUTTON_THUMBR,  // BTN_THUMBR
        _ => PointerEvent::BUTTON_NONE,
    }
}
