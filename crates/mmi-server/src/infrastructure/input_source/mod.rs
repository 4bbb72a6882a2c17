//! Raw input sources for the service.
//!
//! A source produces [`RawInputEvent`]s (kernel-level device samples in
//! evdev terms) on a `std::sync::mpsc` channel.  The input-reader thread
//! drains that channel and feeds every sample through normalization and the
//! dispatch pipeline.
//!
//! # Why a plain `std` channel? (for beginners)
//!
//! The reader thread is an ordinary OS thread, not a Tokio task: the whole
//! pipeline from normalization to the socket write runs synchronously for
//! each sample, so events are never reordered.  `mpsc::Receiver::recv_timeout`
//! lets that thread sleep until either the next sample arrives or a processor
//! timer (the scroll-end timer) is due.
//!
//! # Testability
//!
//! The [`InputSource`] trait lets tests inject synthetic events through
//! [`mock::MockInputSource`]; [`replay::ReplayInputSource`] plays a recorded
//! JSON-lines file for headless runs.

use std::sync::mpsc;

use mmi_core::domain::DeviceId;
use serde::{Deserialize, Serialize};

pub mod mock;
pub mod replay;

/// Where a scroll sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSource {
    /// Notched mouse wheel.
    Wheel,
    /// Two-finger touchpad scrolling.
    Finger,
    /// Trackball or pointing-stick scrolling.
    Continuous,
}

/// A raw device sample, before normalization.
///
/// Times are microseconds on the service clock.  Key and button codes are
/// evdev codes; touchscreen and tablet coordinates are already in display
/// space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawInputEvent {
    DeviceAdded {
        device_id: DeviceId,
        name: String,
        /// `DeviceTags` bits.
        capabilities: u32,
    },
    DeviceRemoved {
        device_id: DeviceId,
    },
    KeyboardKey {
        device_id: DeviceId,
        code: u32,
        pressed: bool,
        time_us: i64,
    },
    /// Relative mouse motion, unaccelerated.
    PointerMotion {
        device_id: DeviceId,
        dx: f64,
        dy: f64,
        time_us: i64,
    },
    PointerButton {
        device_id: DeviceId,
        code: u32,
        pressed: bool,
        time_us: i64,
    },
    PointerAxis {
        device_id: DeviceId,
        source: AxisSource,
        vertical: Option<f64>,
        horizontal: Option<f64>,
        time_us: i64,
    },
    /// Cursor motion produced by a touchpad.
    TouchpadPointerMotion {
        device_id: DeviceId,
        dx: f64,
        dy: f64,
        time_us: i64,
    },
    /// Physical click of a clickpad.
    ///
    /// `x_ratio`/`y_ratio` give the pressing finger's position on the pad in
    /// `0.0..=1.0`; `finger_count` is the number of fingers on the pad.
    TouchpadButton {
        device_id: DeviceId,
        code: u32,
        pressed: bool,
        x_ratio: f64,
        y_ratio: f64,
        finger_count: i32,
        time_us: i64,
    },
    TouchpadDown {
        device_id: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
        pressure: f64,
        time_us: i64,
    },
    TouchpadContactMotion {
        device_id: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
        pressure: f64,
        time_us: i64,
    },
    TouchpadUp {
        device_id: DeviceId,
        slot: i32,
        time_us: i64,
    },
    GestureSwipeBegin {
        device_id: DeviceId,
        fingers: i32,
        time_us: i64,
    },
    GestureSwipeUpdate {
        device_id: DeviceId,
        fingers: i32,
        dx: f64,
        dy: f64,
        time_us: i64,
    },
    GestureSwipeEnd {
        device_id: DeviceId,
        cancelled: bool,
        time_us: i64,
    },
    GesturePinchBegin {
        device_id: DeviceId,
        fingers: i32,
        time_us: i64,
    },
    GesturePinchUpdate {
        device_id: DeviceId,
        fingers: i32,
        /// Absolute scale relative to the gesture start.
        scale: f64,
        /// Rotation since the previous update, in degrees.
        angle_delta: f64,
        time_us: i64,
    },
    GesturePinchEnd {
        device_id: DeviceId,
        cancelled: bool,
        time_us: i64,
    },
    TouchDown {
        device_id: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
        pressure: f64,
        /// Contact ellipse major axis, in pixels.
        major: f64,
        time_us: i64,
    },
    TouchMotion {
        device_id: DeviceId,
        slot: i32,
        x: f64,
        y: f64,
        pressure: f64,
        major: f64,
        time_us: i64,
    },
    TouchUp {
        device_id: DeviceId,
        slot: i32,
        time_us: i64,
    },
    TouchCancel {
        device_id: DeviceId,
        slot: i32,
        time_us: i64,
    },
    JoystickButton {
        device_id: DeviceId,
        code: u32,
        pressed: bool,
        time_us: i64,
    },
    /// One absolute axis, already normalized by the reader.
    JoystickAxis {
        device_id: DeviceId,
        /// evdev `ABS_*` code.
        code: u32,
        value: f64,
        time_us: i64,
    },
    TabletToolAxis {
        device_id: DeviceId,
        x: f64,
        y: f64,
        pressure: f64,
        tilt_x: f64,
        tilt_y: f64,
        time_us: i64,
    },
    TabletToolTip {
        device_id: DeviceId,
        down: bool,
        x: f64,
        y: f64,
        pressure: f64,
        time_us: i64,
    },
    TabletToolProximity {
        device_id: DeviceId,
        in_proximity: bool,
        time_us: i64,
    },
}

impl RawInputEvent {
    /// Device that produced the sample.
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::DeviceAdded { device_id, .. }
            | Self::DeviceRemoved { device_id }
            | Self::KeyboardKey { device_id, .. }
            | Self::PointerMotion { device_id, .. }
            | Self::PointerButton { device_id, .. }
            | Self::PointerAxis { device_id, .. }
            | Self::TouchpadPointerMotion { device_id, .. }
            | Self::TouchpadButton { device_id, .. }
            | Self::TouchpadDown { device_id, .. }
            | Self::TouchpadContactMotion { device_id, .. }
            | Self::TouchpadUp { device_id, .. }
            | Self::GestureSwipeBegin { device_id, .. }
            | Self::GestureSwipeUpdate { device_id, .. }
            | Self::GestureSwipeEnd { device_id, .. }
            | Self::GesturePinchBegin { device_id, .. }
            | Self::GesturePinchUpdate { device_id, .. }
            | Self::GesturePinchEnd { device_id, .. }
            | Self::TouchDown { device_id, .. }
            | Self::TouchMotion { device_id, .. }
            | Self::TouchUp { device_id, .. }
            | Self::TouchCancel { device_id, .. }
            | Self::JoystickButton { device_id, .. }
            | Self::JoystickAxis { device_id, .. }
            | Self::TabletToolAxis { device_id, .. }
            | Self::TabletToolTip { device_id, .. }
            | Self::TabletToolProximity { device_id, .. } => *device_id,
        }
    }
}

/// Error type for input source operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open input source {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("input source has already been started")]
    AlreadyStarted,
}

/// Trait abstracting raw event production.
pub trait InputSource: Send {
    /// Starts the source and returns a receiver for its events.
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError>;
    /// Stops the source; the receiver disconnects once buffered events drain.
    fn stop(&self);
}
