//! Handler registration descriptors shared by client and service.
//!
//! Interceptors and monitors are registered with a [`HandlerType`], an
//! [`EventTypeMask`] naming the event classes they want, a priority, and a
//! [`DeviceTags`] mask naming the device capabilities they accept.

use serde::{Deserialize, Serialize};

use super::pointer_event::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum HandlerType {
    Interceptor = 1,
    Monitor = 2,
}

impl TryFrom<i32> for HandlerType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            1 => Ok(Self::Interceptor),
            2 => Ok(Self::Monitor),
            _ => Err(()),
        }
    }
}

/// Bitmask of event classes a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventTypeMask(pub u32);

impl EventTypeMask {
    pub const NONE: u32 = 0;
    pub const KEY: u32 = 1 << 0;
    /// Mouse, touchpad, joystick and tablet pointer events.
    pub const POINTER: u32 = 1 << 1;
    pub const TOUCH: u32 = 1 << 2;
    pub const ALL: u32 = Self::KEY | Self::POINTER | Self::TOUCH;

    pub fn is_empty(self) -> bool {
        self.0 == Self::NONE
    }

    /// Returns `true` if every bit of `class` is set in this mask.
    pub fn contains(self, class: u32) -> bool {
        class != Self::NONE && self.0 & class == class
    }

    pub fn union(self, other: EventTypeMask) -> EventTypeMask {
        EventTypeMask(self.0 | other.0)
    }

    /// Event class a pointer event from `source` belongs to.
    pub fn class_of(source: SourceType) -> u32 {
        match source {
            SourceType::TouchScreen => Self::TOUCH,
            _ => Self::POINTER,
        }
    }
}

/// Bitmask of device capabilities, one bit per capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceTags(pub u32);

impl DeviceTags {
    pub const KEYBOARD: u32 = 1 << 0;
    pub const POINTER: u32 = 1 << 1;
    pub const TOUCH: u32 = 1 << 2;
    pub const TABLET_TOOL: u32 = 1 << 3;
    pub const TABLET_PAD: u32 = 1 << 4;
    pub const GESTURE: u32 = 1 << 5;
    pub const SWITCH: u32 = 1 << 6;
    pub const JOYSTICK: u32 = 1 << 7;
    pub const ALL: u32 = (1 << 8) - 1;

    /// Returns `true` if any capability bit is shared.
    pub fn matches(self, capabilities: DeviceTags) -> bool {
        self.0 & capabilities.0 != 0
    }

    /// Capability bits implied by a pointer event's source.
    pub fn for_source(source: SourceType) -> DeviceTags {
        let bits = match source {
            SourceType::Mouse | SourceType::Touchpad => Self::POINTER,
            SourceType::TouchScreen => Self::TOUCH,
            SourceType::Joystick => Self::JOYSTICK,
            SourceType::Unknown => 0,
        };
        DeviceTags(bits)
    }

    /// Capability bits of key events.
    pub fn keyboard() -> DeviceTags {
        DeviceTags(Self::KEYBOARD)
    }
}

/// Identifies a monitor registered through one of the three monitor
/// subsystems that share a raw id space.
///
/// The legacy wire form packs the class into the last decimal digit
/// (`raw * 10 + tag`); [`MonitorId::to_wire`] and [`MonitorId::from_wire`]
/// convert at the boundary so nothing else does arithmetic on ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorId {
    Key(i32),
    Touch(i32),
    Touchpad(i32),
}

impl MonitorId {
    const TAG_KEY: i32 = 1;
    const TAG_TOUCH: i32 = 2;
    const TAG_TOUCHPAD: i32 = 3;

    pub fn raw(self) -> i32 {
        match self {
            Self::Key(r) | Self::Touch(r) | Self::Touchpad(r) => r,
        }
    }

    /// Packs into the legacy `raw * 10 + tag` integer.
    ///
    /// Returns `None` if `raw` is negative or the product overflows.
    pub fn to_wire(self) -> Option<i32> {
        let tag = match self {
            Self::Key(_) => Self::TAG_KEY,
            Self::Touch(_) => Self::TAG_TOUCH,
            Self::Touchpad(_) => Self::TAG_TOUCHPAD,
        };
        let raw = self.raw();
        if raw < 0 {
            return None;
        }
        raw.checked_mul(10)?.checked_add(tag)
    }

    /// Unpacks a legacy `raw * 10 + tag` integer.
    pub fn from_wire(value: i32) -> Option<Self> {
        if value < 0 {
            return None;
        }
        let raw = value / 10;
        match value % 10 {
            Self::TAG_KEY => Some(Self::Key(raw)),
            Self::TAG_TOUCH => Some(Self::Touch(raw)),
            Self::TAG_TOUCHPAD => Some(Self::Touchpad(raw)),
            _ => None,
        }
    }
}

/// Which acknowledgement stream an event belongs to for ANR tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AnrEventType {
    Dispatch = 0,
    Monitor = 1,
}

impl AnrEventType {
    pub const ALL: [AnrEventType; 2] = [AnrEventType::Dispatch, AnrEventType::Monitor];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<i32> for AnrEventType {
    type Error = ();
    fn try_from(v: i32) -> Result<Self, ()> {
        match v {
            0 => Ok(Self::Dispatch),
            1 => Ok(Self::Monitor),
            _ => Err(()),
        }
    }
}
