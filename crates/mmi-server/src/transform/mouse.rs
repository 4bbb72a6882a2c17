//! Mouse transform processor.
//!
//! Handles every sample that moves or clicks the shared cursor: relative
//! mouse motion, touchpad cursor motion, mouse and clickpad buttons, and
//! wheel or two-finger scrolling.
//!
//! # Event shapes
//!
//! | Raw sample            | Action emitted                         |
//! |-----------------------|----------------------------------------|
//! | motion                | `MOVE` (button id carried over)        |
//! | button press          | `BUTTON_DOWN`, button added to pressed |
//! | button release        | `BUTTON_UP`, button removed            |
//! | first scroll sample   | `AXIS_BEGIN`                           |
//! | later scroll samples  | `AXIS_UPDATE` (idle timer restarted)   |
//! | idle timer expiry     | `AXIS_END` via [`TransformProcessor::on_timer`] |
//!
//! # Cursor placement
//!
//! The cursor lives in [`CursorPosition`], shared with every other relative
//! device.  With no display known, normalization fails with
//! [`TransformError::NoDisplay`] and the cursor is reset to "unset"; the
//! next motion after a display appears re-centres it on the first display.

use std::time::{Duration, Instant};

use mmi_core::domain::{AxisType, DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType};
use mmi_core::keymap::evdev::evdev_to_mouse_button;
use tracing::{debug, trace};

use super::accel::{accelerate, AccelerationCurve, MOUSE_CURVE, TOUCHPAD_CURVE};
use super::{
    clamp_to_display, CursorPosition, PrimaryButton, RightClickType, TransformContext,
    TransformError, TransformProcessor,
};
use crate::infrastructure::input_source::{AxisSource, RawInputEvent};

/// Lower part of a clickpad, as a fraction of its height, that acts as the button area.
const BUTTON_AREA_TOP: f64 = 0.8;

/// Running scroll gesture.
#[derive(Debug, Clone, Copy)]
struct AxisGesture {
    deadline: Instant,
    last_time_us: i64,
    timeout: Duration,
}

pub struct MouseTransformProcessor {
    device_id: DeviceId,
    pointer_event: PointerEvent,
    /// Button id carried into subsequent motion events.
    button_id: i32,
    axis: Option<AxisGesture>,
    /// Logical button a clickpad press resolved to, so the release matches.
    clickpad_button: Option<i32>,
}

impl MouseTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut pointer_event = PointerEvent::new(SourceType::Mouse);
        pointer_event.device_id = device_id;
        pointer_event.pointer_id = 0;
        Self {
            device_id,
            pointer_event,
            button_id: PointerEvent::BUTTON_NONE,
            axis: None,
            clickpad_button: None,
        }
    }

    // ── Motion ────────────────────────────────────────────────────────────────

    fn handle_motion(
        &mut self,
        dx: f64,
        dy: f64,
        curve: &AccelerationCurve,
        speed: i32,
        ctx: &mut TransformContext<'_>,
    ) -> Result<(), TransformError> {
        place_cursor(ctx)?;
        let (ax, ay) = accelerate(curve, speed, dx, dy);
        let display = ctx
            .displays
            .display(ctx.cursor.display_id)
            .ok_or(TransformError::NoDisplay)?;
        let (x, y) = clamp_to_display(display, ctx.cursor.x + ax, ctx.cursor.y + ay);
        ctx.cursor.x = x;
        ctx.cursor.y = y;
        trace!(device_id = self.device_id, x, y, "cursor moved");

        self.pointer_event.pointer_action = PointerAction::Move;
        self.pointer_event.button_id = self.button_id;
        Ok(())
    }

    // ── Buttons ───────────────────────────────────────────────────────────────

    fn handle_button(
        &mut self,
        button: i32,
        pressed: bool,
        time_us: i64,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        if button == PointerEvent::BUTTON_NONE {
            debug!(device_id = self.device_id, "unmapped button ignored");
            return Ok(None);
        }
        place_cursor(ctx)?;
        self.end_axis_silently();

        let event = &mut self.pointer_event;
        event.button_id = button;
        if pressed {
            event.set_button_pressed(button);
            event.pointer_action = PointerAction::ButtonDown;
            self.button_id = button;
            if event.pressed_buttons().len() == 1 {
                event.action_start_time = time_us;
            }
        } else {
            event.delete_released_button(button);
            event.pointer_action = PointerAction::ButtonUp;
            self.button_id = PointerEvent::BUTTON_NONE;
        }
        Ok(Some(event.pointer_action))
    }

    fn clickpad_button(
        &mut self,
        code: u32,
        pressed: bool,
        x_ratio: f64,
        y_ratio: f64,
        finger_count: i32,
        right_click: RightClickType,
    ) -> i32 {
        if !pressed {
            return self
                .clickpad_button
                .take()
                .unwrap_or_else(|| evdev_to_mouse_button(code));
        }
        let button = touchpad_logical_button(code, x_ratio, y_ratio, finger_count, right_click);
        self.clickpad_button = Some(button);
        button
    }

    // ── Axis ──────────────────────────────────────────────────────────────────

    fn handle_axis(
        &mut self,
        source: AxisSource,
        vertical: Option<f64>,
        horizontal: Option<f64>,
        time_us: i64,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        if vertical.is_none() && horizontal.is_none() {
            return Ok(None);
        }
        place_cursor(ctx)?;

        let scale = match source {
            AxisSource::Wheel => f64::from(ctx.settings.scroll_rows) / 3.0,
            AxisSource::Finger | AxisSource::Continuous => 1.0,
        };
        let sign = if source == AxisSource::Finger && ctx.settings.natural_scroll {
            -1.0
        } else {
            1.0
        };

        let event = &mut self.pointer_event;
        event.clear_axis_values();
        if let Some(v) = vertical {
            event.set_axis_value(AxisType::ScrollVertical, v * scale * sign);
        }
        if let Some(h) = horizontal {
            event.set_axis_value(AxisType::ScrollHorizontal, h * scale * sign);
        }
        self.button_id = PointerEvent::BUTTON_NONE;
        event.button_id = PointerEvent::BUTTON_NONE;

        event.pointer_action = if self.axis.is_none() {
            event.action_start_time = time_us;
            PointerAction::AxisBegin
        } else {
            PointerAction::AxisUpdate
        };
        let timeout = ctx.settings.axis_end_timeout;
        self.axis = Some(AxisGesture {
            deadline: ctx.now + timeout,
            last_time_us: time_us,
            timeout,
        });
        Ok(Some(event.pointer_action))
    }

    /// Drops a running scroll gesture when a button takes over the device.
    fn end_axis_silently(&mut self) {
        if self.axis.take().is_some() {
            debug!(device_id = self.device_id, "scroll gesture interrupted by button");
            self.pointer_event.clear_axis_values();
        }
    }

    // ── Output ────────────────────────────────────────────────────────────────

    fn update_item(&mut self, cursor: &CursorPosition, tool: ToolType, time_us: i64) {
        let event = &mut self.pointer_event;
        let down_time = if event.pointer_action == PointerAction::ButtonDown
            && event.pressed_buttons().len() == 1
        {
            time_us
        } else {
            event.pointer_item(0).map(|i| i.down_time).unwrap_or(0)
        };
        let mut item = PointerItem::new(0);
        item.display_x = cursor.x.round() as i32;
        item.display_y = cursor.y.round() as i32;
        item.pressed = !event.pressed_buttons().is_empty();
        item.down_time = down_time;
        item.tool_type = tool;
        item.device_id = self.device_id;
        event.update_pointer_item(item);
        event.target_display_id = cursor.display_id;
        event.action_time = time_us;
    }
}

impl TransformProcessor for MouseTransformProcessor {
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        let settings = ctx.settings.clone();
        let (result, tool, time_us) = match *raw {
            RawInputEvent::PointerMotion { dx, dy, time_us, .. } => (
                self.handle_motion(dx, dy, &MOUSE_CURVE, settings.mouse_speed, ctx)
                    .map(|()| Some(PointerAction::Move)),
                ToolType::Mouse,
                time_us,
            ),
            RawInputEvent::TouchpadPointerMotion { dx, dy, time_us, .. } => (
                self.handle_motion(dx, dy, &TOUCHPAD_CURVE, settings.touchpad_speed, ctx)
                    .map(|()| Some(PointerAction::Move)),
                ToolType::Touchpad,
                time_us,
            ),
            RawInputEvent::PointerButton {
                code,
                pressed,
                time_us,
                ..
            } => {
                let button = swap_primary(evdev_to_mouse_button(code), settings.primary_button);
                (
                    self.handle_button(button, pressed, time_us, ctx),
                    ToolType::Mouse,
                    time_us,
                )
            }
            RawInputEvent::TouchpadButton {
                code,
                pressed,
                x_ratio,
                y_ratio,
                finger_count,
                time_us,
                ..
            } => {
                let button = self.clickpad_button(
                    code,
                    pressed,
                    x_ratio,
                    y_ratio,
                    finger_count,
                    settings.right_click,
                );
                let button = swap_primary(button, settings.primary_button);
                (
                    self.handle_button(button, pressed, time_us, ctx),
                    ToolType::Touchpad,
                    time_us,
                )
            }
            RawInputEvent::PointerAxis {
                source,
                vertical,
                horizontal,
                time_us,
                ..
            } => {
                let tool = if source == AxisSource::Finger {
                    ToolType::Touchpad
                } else {
                    ToolType::Mouse
                };
                (
                    self.handle_axis(source, vertical, horizontal, time_us, ctx),
                    tool,
                    time_us,
                )
            }
            _ => return Err(TransformError::Unsupported("mouse")),
        };

        let action = result?;
        if action.is_some() {
            let cursor = *ctx.cursor;
            self.update_item(&cursor, tool, time_us);
        }
        Ok(action)
    }

    fn pointer_event(&self) -> &PointerEvent {
        &self.pointer_event
    }

    fn on_timer(&mut self, now: Instant) -> Option<PointerEvent> {
        let gesture = self.axis?;
        if now < gesture.deadline {
            return None;
        }
        self.axis = None;
        let timeout_us = i64::try_from(gesture.timeout.as_micros()).unwrap_or(i64::MAX);
        let event = &mut self.pointer_event;
        event.pointer_action = PointerAction::AxisEnd;
        event.button_id = PointerEvent::BUTTON_NONE;
        event.action_time = gesture.last_time_us.saturating_add(timeout_us);
        trace!(device_id = self.device_id, "scroll gesture ended");
        Some(event.clone())
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.axis.map(|a| a.deadline)
    }
}

/// Makes sure the cursor sits on a known display.
///
/// Resets the cursor to unset and fails when there is no display at all.
fn place_cursor(ctx: &mut TransformContext<'_>) -> Result<(), TransformError> {
    let Some(first) = ctx.displays.first_display() else {
        *ctx.cursor = CursorPosition::UNSET;
        return Err(TransformError::NoDisplay);
    };
    if ctx.cursor.is_unset() || ctx.displays.display(ctx.cursor.display_id).is_none() {
        *ctx.cursor = CursorPosition {
            display_id: first.id,
            x: f64::from(first.width / 2),
            y: f64::from(first.height / 2),
        };
        debug!(display_id = first.id, "cursor centred on first display");
    }
    Ok(())
}

fn swap_primary(button: i32, primary: PrimaryButton) -> i32 {
    match (primary, button) {
        (PrimaryButton::Right, PointerEvent::MOUSE_BUTTON_LEFT) => PointerEvent::MOUSE_BUTTON_RIGHT,
        (PrimaryButton::Right, PointerEvent::MOUSE_BUTTON_RIGHT) => PointerEvent::MOUSE_BUTTON_LEFT,
        _ => button,
    }
}

/// Resolves a clickpad press to a logical button using the right-click style.
///
/// Codes without a mouse mapping resolve to no button.
pub fn touchpad_logical_button(
    code: u32,
    x_ratio: f64,
    y_ratio: f64,
    finger_count: i32,
    right_click: RightClickType,
) -> i32 {
    let physical = evdev_to_mouse_button(code);
    if physical != PointerEvent::MOUSE_BUTTON_LEFT {
        return physical;
    }
    let in_button_area = y_ratio >= BUTTON_AREA_TOP;
    let secondary = match right_click {
        RightClickType::RightCorner => in_button_area && x_ratio > 0.5,
        RightClickType::LeftCorner => in_button_area && x_ratio < 0.5,
        RightClickType::TwoFingerTap => finger_count == 2,
    };
    if secondary {
        PointerEvent::MOUSE_BUTTON_RIGHT
    } else {
        PointerEvent::MOUSE_BUTTON_LEFT
    }
}
