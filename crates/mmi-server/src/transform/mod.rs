//! Device transform processors.
//!
//! A transform processor turns raw device samples from one device into
//! canonical [`PointerEvent`]s.  Each processor owns a single `PointerEvent`
//! and mutates it in place on every sample: fields such as the pressed
//! button set, the current button id, and the contact list persist from one
//! call to the next for the whole gesture.  Callers read the result through
//! [`TransformProcessor::pointer_event`] and clone it if they need to keep it.
//!
//! # Single owner (for beginners)
//!
//! Processors are `Send` but deliberately not `Sync`: they are created and
//! used only by the input-reader thread.  The `&mut self` receiver on
//! [`TransformProcessor::normalize`] makes the compiler enforce that at most
//! one caller touches a processor at a time.
//!
//! # Timers
//!
//! The mouse processor ends a scroll gesture after an idle timeout.  Instead
//! of owning a timer thread, it reports its deadline through
//! [`TransformProcessor::next_deadline`]; the reader loop waits at most until
//! then and calls [`TransformProcessor::on_timer`].  Time is passed in, so
//! tests drive the timer with synthetic instants.

use std::time::{Duration, Instant};

use mmi_core::domain::{DeviceId, DisplayGroupInfo, PointerAction, PointerEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::input_source::RawInputEvent;

pub mod accel;
pub mod joystick;
pub mod keyboard;
pub mod mouse;
pub mod tablet_tool;
pub mod touchpad;
pub mod touchscreen;

pub use joystick::JoystickTransformProcessor;
pub use keyboard::KeyTransformProcessor;
pub use mouse::MouseTransformProcessor;
pub use tablet_tool::TabletToolTransformProcessor;
pub use touchpad::TouchpadTransformProcessor;
pub use touchscreen::{KnuckleClassifier, NoopKnuckleClassifier, TouchTransformProcessor};

/// Error type for normalization.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    /// No display is known, so absolute coordinates cannot be computed.
    #[error("no display available")]
    NoDisplay,
    /// The sample belongs to a different processor kind.
    #[error("raw event not handled by the {0} processor")]
    Unsupported(&'static str),
    /// A contact update referenced a slot that is not down.
    #[error("contact slot {0} is not down")]
    UnknownSlot(i32),
    /// The device was never announced or has been removed.
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),
}

/// Which physical mouse button acts as the primary (left) button.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryButton {
    #[default]
    Left,
    Right,
}

/// How a touchpad produces a secondary (right) click.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RightClickType {
    /// Pressing in the bottom-right area of the pad.
    #[default]
    RightCorner,
    /// Pressing in the bottom-left area of the pad.
    LeftCorner,
    /// Clicking with two fingers on the pad.
    TwoFingerTap,
}

/// Pointer preferences applied during normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSettings {
    /// 1..=11
    pub mouse_speed: i32,
    /// 1..=11
    pub touchpad_speed: i32,
    pub primary_button: PrimaryButton,
    pub right_click: RightClickType,
    pub scroll_rows: i32,
    pub natural_scroll: bool,
    pub axis_end_timeout: Duration,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            mouse_speed: 5,
            touchpad_speed: 5,
            primary_button: PrimaryButton::Left,
            right_click: RightClickType::RightCorner,
            scroll_rows: 3,
            natural_scroll: false,
            axis_end_timeout: Duration::from_millis(100),
        }
    }
}

/// Absolute cursor position shared by every relative pointing device.
///
/// `(-1, -1)` means "not placed yet"; the next motion centres it on the
/// first display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    pub display_id: i32,
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub const UNSET: CursorPosition = CursorPosition {
        display_id: -1,
        x: -1.0,
        y: -1.0,
    };

    pub fn is_unset(&self) -> bool {
        self.display_id < 0
    }
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self::UNSET
    }
}

/// State shared with processors for one normalization call.
pub struct TransformContext<'a> {
    pub displays: &'a DisplayGroupInfo,
    pub cursor: &'a mut CursorPosition,
    pub settings: &'a PointerSettings,
    pub knuckle: &'a dyn KnuckleClassifier,
    /// Reader-loop clock; used only for timers.
    pub now: Instant,
}

/// Processor kinds; one device may feed more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessorKind {
    Mouse,
    Touchpad,
    TouchScreen,
    Joystick,
    TabletTool,
}

impl ProcessorKind {
    /// Processor responsible for `raw`, or `None` for device lifecycle and key samples.
    pub fn for_raw(raw: &RawInputEvent) -> Option<ProcessorKind> {
        use RawInputEvent as R;
        match raw {
            R::PointerMotion { .. }
            | R::PointerButton { .. }
            | R::PointerAxis { .. }
            | R::TouchpadPointerMotion { .. }
            | R::TouchpadButton { .. } => Some(Self::Mouse),
            R::TouchpadDown { .. }
            | R::TouchpadContactMotion { .. }
            | R::TouchpadUp { .. }
            | R::GestureSwipeBegin { .. }
            | R::GestureSwipeUpdate { .. }
            | R::GestureSwipeEnd { .. }
            | R::GesturePinchBegin { .. }
            | R::GesturePinchUpdate { .. }
            | R::GesturePinchEnd { .. } => Some(Self::Touchpad),
            R::TouchDown { .. } | R::TouchMotion { .. } | R::TouchUp { .. } | R::TouchCancel { .. } => {
                Some(Self::TouchScreen)
            }
            R::JoystickButton { .. } | R::JoystickAxis { .. } => Some(Self::Joystick),
            R::TabletToolAxis { .. } | R::TabletToolTip { .. } | R::TabletToolProximity { .. } => {
                Some(Self::TabletTool)
            }
            R::DeviceAdded { .. } | R::DeviceRemoved { .. } | R::KeyboardKey { .. } => None,
        }
    }

    /// Creates a fresh processor of this kind for `device_id`.
    pub fn create(self, device_id: DeviceId) -> Box<dyn TransformProcessor> {
        match self {
            Self::Mouse => Box::new(MouseTransformProcessor::new(device_id)),
            Self::Touchpad => Box::new(TouchpadTransformProcessor::new(device_id)),
            Self::TouchScreen => Box::new(TouchTransformProcessor::new(device_id)),
            Self::Joystick => Box::new(JoystickTransformProcessor::new(device_id)),
            Self::TabletTool => Box::new(TabletToolTransformProcessor::new(device_id)),
        }
    }
}

/// Converts raw samples from one device into one running [`PointerEvent`].
pub trait TransformProcessor: Send {
    /// Applies `raw` to the running event.
    ///
    /// Returns the action of the updated event, or `None` when the sample
    /// changes state without producing an event (e.g. pen hover).
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError>;

    /// The running event as of the last `normalize` or `on_timer` call.
    fn pointer_event(&self) -> &PointerEvent;

    /// Fires a due timer, returning the synthesized event.
    fn on_timer(&mut self, _now: Instant) -> Option<PointerEvent> {
        None
    }

    /// When `on_timer` next needs to run.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }
}

/// Clamps `(x, y)` into `display`, returning the clamped point.
pub(crate) fn clamp_to_display(
    display: &mmi_core::domain::DisplayInfo,
    x: f64,
    y: f64,
) -> (f64, f64) {
    let max_x = f64::from((display.width - 1).max(0));
    let max_y = f64::from((display.height - 1).max(0));
    (x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

#[cfg(test)]
pub(crate) mod test_support {
    use mmi_core::domain::{DisplayGroupInfo, DisplayInfo};

    pub fn one_display(width: i32, height: i32) -> DisplayGroupInfo {
        DisplayGroupInfo {
            width,
            height,
            focus_window_id: -1,
            windows: Vec::new(),
            displays: vec![DisplayInfo {
                id: 0,
                x: 0,
                y: 0,
                width,
                height,
                dpi: 160,
                name: "test".to_string(),
            }],
        }
    }
}
