//! Logical key codes.
//!
//! This is the key representation carried in every [`crate::domain::KeyEvent`]
//! on the wire.  Physical scan codes from the kernel are translated to these
//! values at the normalization boundary, so clients never see evdev codes.
//!
//! # Why not send evdev codes directly? (for beginners)
//!
//! Linux evdev codes (`KEY_A = 30`, `KEY_ENTER = 28`, ...) describe physical
//! key positions on a PC keyboard and carry historic gaps and oddities.
//! Logical codes group related keys into contiguous ranges (digits from
//! 2000, letters from 2017, function keys from 2090), which makes range
//! checks such as "is this a letter?" trivial and keeps clients independent
//! of the kernel's numbering.
//!
//! # The `Unknown` sentinel
//!
//! [`KeyCode::Unknown`] (value -1) stands for any physical key without a
//! logical mapping.  Key events carrying it are rejected by validation.

use serde::{Deserialize, Serialize};

/// Logical key code; the numeric value is what travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum KeyCode {
    Unknown = -1,

    // System keys
    Home = 1,
    Back = 2,
    VolumeUp = 16,
    VolumeDown = 17,
    Power = 18,
    VolumeMute = 22,

    // Digits (2000–2009)
    Digit0 = 2000,
    Digit1 = 2001,
    Digit2 = 2002,
    Digit3 = 2003,
    Digit4 = 2004,
    Digit5 = 2005,
    Digit6 = 2006,
    Digit7 = 2007,
    Digit8 = 2008,
    Digit9 = 2009,

    // Navigation
    DpadUp = 2012,
    DpadDown = 2013,
    DpadLeft = 2014,
    DpadRight = 2015,

    // Letters (2017–2042)
    A = 2017,
    B = 2018,
    C = 2019,
    D = 2020,
    E = 2021,
    F = 2022,
    G = 2023,
    H = 2024,
    I = 2025,
    J = 2026,
    K = 2027,
    L = 2028,
    M = 2029,
    N = 2030,
    O = 2031,
    P = 2032,
    Q = 2033,
    R = 2034,
    S = 2035,
    T = 2036,
    U = 2037,
    V = 2038,
    W = 2039,
    X = 2040,
    Y = 2041,
    Z = 2042,

    Comma = 2043,
    Period = 2044,
    AltLeft = 2045,
    AltRight = 2046,
    ShiftLeft = 2047,
    ShiftRight = 2048,
    Tab = 2049,
    Space = 2050,
    Enter = 2054,
    Del = 2055,
    Grave = 2056,
    Minus = 2057,
    Equals = 2058,
    LeftBracket = 2059,
    RightBracket = 2060,
    Backslash = 2061,
    Semicolon = 2062,
    Apostrophe = 2063,
    Slash = 2064,
    PageUp = 2068,
    PageDown = 2069,
    Escape = 2070,
    ForwardDel = 2071,
    CtrlLeft = 2072,
    CtrlRight = 2073,
    CapsLock = 2074,
    ScrollLock = 2075,
    MetaLeft = 2076,
    MetaRight = 2077,
    Sysrq = 2079,
    Break = 2080,
    MoveHome = 2081,
    MoveEnd = 2082,
    Insert = 2083,

    // Function keys (2090–2101)
    F1 = 2090,
    F2 = 2091,
    F3 = 2092,
    F4 = 2093,
    F5 = 2094,
    F6 = 2095,
    F7 = 2096,
    F8 = 2097,
    F9 = 2098,
    F10 = 2099,
    F11 = 2100,
    F12 = 2101,
    NumLock = 2102,
}

impl KeyCode {
    /// Wire value of this key code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns `true` for Ctrl, Shift, Alt and Meta keys on either side.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::CtrlLeft
                | Self::CtrlRight
                | Self::ShiftLeft
                | Self::ShiftRight
                | Self::AltLeft
                | Self::AltRight
                | Self::MetaLeft
                | Self::MetaRight
        )
    }
}
