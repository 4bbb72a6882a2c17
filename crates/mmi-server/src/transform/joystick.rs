//! Joystick and gamepad processor.
//!
//! Buttons become `BUTTON_DOWN`/`BUTTON_UP` with joystick button ids; each
//! absolute axis sample becomes an `AXIS_UPDATE` carrying that one axis.
//! Axis values arrive already normalized by the reader.

use mmi_core::domain::{AxisType, DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType};
use mmi_core::keymap::evdev::evdev_to_joystick_button;
use tracing::debug;

use super::{TransformContext, TransformError, TransformProcessor};
use crate::infrastructure::input_source::RawInputEvent;

const ABS_X: u32 = 0x00;
const ABS_Y: u32 = 0x01;
const ABS_Z: u32 = 0x02;
const ABS_RZ: u32 = 0x05;
const ABS_THROTTLE: u32 = 0x06;
const ABS_GAS: u32 = 0x09;
const ABS_BRAKE: u32 = 0x0a;
const ABS_HAT0X: u32 = 0x10;
const ABS_HAT0Y: u32 = 0x11;

/// Maps an evdev `ABS_*` code to the axis it reports.
pub fn abs_to_axis(code: u32) -> Option<AxisType> {
    match code {
        ABS_X => Some(AxisType::AbsX),
        ABS_Y => Some(AxisType::AbsY),
        ABS_Z => Some(AxisType::AbsZ),
        ABS_RZ => Some(AxisType::AbsRz),
        ABS_THROTTLE => Some(AxisType::AbsThrottle),
        ABS_GAS => Some(AxisType::AbsGas),
        ABS_BRAKE => Some(AxisType::AbsBrake),
        ABS_HAT0X => Some(AxisType::AbsHat0X),
        ABS_HAT0Y => Some(AxisType::AbsHat0Y),
        _ => None,
    }
}

pub struct JoystickTransformProcessor {
    device_id: DeviceId,
    pointer_event: PointerEvent,
}

impl JoystickTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut pointer_event = PointerEvent::new(SourceType::Joystick);
        pointer_event.device_id = device_id;
        pointer_event.pointer_id = 0;
        let mut item = PointerItem::new(0);
        item.tool_type = ToolType::Joystick;
        item.device_id = device_id;
        pointer_event.add_pointer_item(item);
        Self {
            device_id,
            pointer_event,
        }
    }
}

impl TransformProcessor for JoystickTransformProcessor {
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        _ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        let event = &mut self.pointer_event;
        match *raw {
            RawInputEvent::JoystickButton {
                code,
                pressed,
                time_us,
                ..
            } => {
                let button = evdev_to_joystick_button(code);
                if button == PointerEvent::BUTTON_NONE {
                    debug!(device_id = self.device_id, code, "unmapped joystick button ignored");
                    return Ok(None);
                }
                event.clear_axis_values();
                event.button_id = button;
                if pressed {
                    event.set_button_pressed(button);
                    event.pointer_action = PointerAction::ButtonDown;
                } else {
                    event.delete_released_button(button);
                    event.pointer_action = PointerAction::ButtonUp;
                }
                event.action_time = time_us;
                Ok(Some(event.pointer_action))
            }
            RawInputEvent::JoystickAxis {
                code, value, time_us, ..
            } => {
                let Some(axis) = abs_to_axis(code) else {
                    debug!(device_id = self.device_id, code, "unmapped joystick axis ignored");
                    return Ok(None);
                };
                event.clear_axis_values();
                event.set_axis_value(axis, value);
                event.button_id = PointerEvent::BUTTON_NONE;
                event.pointer_action = PointerAction::AxisUpdate;
                event.action_time = time_us;
                Ok(Some(PointerAction::AxisUpdate))
            }
            _ => Err(TransformError::Unsupported("joystick")),
        }
    }

    fn pointer_event(&self) -> &PointerEvent {
        &self.pointer_event
    }
}
