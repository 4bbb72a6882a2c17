//! Touchpad contact and gesture processor.
//!
//! Cursor motion and clicks from a touchpad go through the mouse processor;
//! this one handles what only a touchpad produces:
//!
//! - raw finger contacts, reported as `DOWN`/`MOVE`/`UP` with source
//!   `TOUCHPAD` and one item per finger (pointer id = slot);
//! - multi-finger swipes, reported as `SWIPE_BEGIN/UPDATE/END`;
//! - pinches, reported as `AXIS_BEGIN/UPDATE/END` carrying the `PINCH`
//!   (scale) and `ROTATE` (accumulated degrees) axes.
//!
//! Contact coordinates stay in pad space; nothing here touches the cursor.

use std::collections::BTreeMap;

use mmi_core::domain::{AxisType, DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType};
use tracing::debug;

use super::{TransformContext, TransformError, TransformProcessor};
use crate::infrastructure::input_source::RawInputEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Swipe { x: f64, y: f64 },
    Pinch { rotation: f64 },
}

pub struct TouchpadTransformProcessor {
    device_id: DeviceId,
    pointer_event: PointerEvent,
    /// Fingers currently on the pad, by slot.
    contacts: BTreeMap<i32, PointerItem>,
    gesture: Option<Gesture>,
}

impl TouchpadTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut pointer_event = PointerEvent::new(SourceType::Touchpad);
        pointer_event.device_id = device_id;
        Self {
            device_id,
            pointer_event,
            contacts: BTreeMap::new(),
            gesture: None,
        }
    }

    // ── Contacts ──────────────────────────────────────────────────────────────

    fn contact_down(&mut self, slot: i32, x: f64, y: f64, pressure: f64, time_us: i64) -> PointerAction {
        let mut item = PointerItem::new(slot);
        item.pressed = true;
        item.down_time = time_us;
        item.display_x = x.round() as i32;
        item.display_y = y.round() as i32;
        item.pressure = pressure;
        item.tool_type = ToolType::Touchpad;
        item.device_id = self.device_id;
        if self.contacts.is_empty() {
            self.pointer_event.action_start_time = time_us;
        }
        self.contacts.insert(slot, item);
        self.emit_contacts(slot, PointerAction::Down, time_us);
        PointerAction::Down
    }

    fn contact_motion(
        &mut self,
        slot: i32,
        x: f64,
        y: f64,
        pressure: f64,
        time_us: i64,
    ) -> Result<PointerAction, TransformError> {
        let item = self.contacts.get_mut(&slot).ok_or(TransformError::UnknownSlot(slot))?;
        item.display_x = x.round() as i32;
        item.display_y = y.round() as i32;
        item.pressure = pressure;
        self.emit_contacts(slot, PointerAction::Move, time_us);
        Ok(PointerAction::Move)
    }

    fn contact_up(&mut self, slot: i32, time_us: i64) -> Result<PointerAction, TransformError> {
        let item = self.contacts.get_mut(&slot).ok_or(TransformError::UnknownSlot(slot))?;
        item.pressed = false;
        self.emit_contacts(slot, PointerAction::Up, time_us);
        self.contacts.remove(&slot);
        Ok(PointerAction::Up)
    }

    /// Rebuilds the running event from the contact table.
    fn emit_contacts(&mut self, slot: i32, action: PointerAction, time_us: i64) {
        let event = &mut self.pointer_event;
        event.clear_pointer_items();
        event.clear_axis_values();
        for item in self.contacts.values() {
            event.add_pointer_item(item.clone());
        }
        event.pointer_id = slot;
        event.pointer_action = action;
        event.action_time = time_us;
        event.finger_count = self.contacts.values().filter(|i| i.pressed).count() as i32;
    }

    // ── Gestures ──────────────────────────────────────────────────────────────

    fn begin_gesture(&mut self, gesture: Gesture, fingers: i32, time_us: i64) -> PointerAction {
        let action = match gesture {
            Gesture::Swipe { .. } => PointerAction::SwipeBegin,
            Gesture::Pinch { .. } => PointerAction::AxisBegin,
        };
        self.gesture = Some(gesture);
        let event = &mut self.pointer_event;
        event.action_start_time = time_us;
        event.finger_count = fingers;
        self.emit_gesture(action, true, time_us);
        if matches!(gesture, Gesture::Pinch { .. }) {
            self.pointer_event.set_axis_value(AxisType::Pinch, 1.0);
            self.pointer_event.set_axis_value(AxisType::Rotate, 0.0);
        }
        action
    }

    fn end_gesture(&mut self, cancelled: bool, time_us: i64) -> Option<PointerAction> {
        let Some(gesture) = self.gesture.take() else {
            debug!(device_id = self.device_id, "gesture end without begin ignored");
            return None;
        };
        let action = match (cancelled, gesture) {
            (true, _) => PointerAction::Cancel,
            (false, Gesture::Swipe { .. }) => PointerAction::SwipeEnd,
            (false, Gesture::Pinch { .. }) => PointerAction::AxisEnd,
        };
        let axes = self.pointer_event.axes().clone();
        self.emit_gesture(action, false, time_us);
        for (axis, value) in axes {
            self.pointer_event.set_axis_value(axis, value);
        }
        Some(action)
    }

    /// Gestures carry one synthetic item at the swipe offset.
    fn emit_gesture(&mut self, action: PointerAction, pressed: bool, time_us: i64) {
        let (x, y) = match self.gesture {
            Some(Gesture::Swipe { x, y }) => (x, y),
            _ => (0.0, 0.0),
        };
        let event = &mut self.pointer_event;
        let down_time = event.action_start_time;
        event.clear_pointer_items();
        event.clear_axis_values();
        let mut item = PointerItem::new(0);
        item.pressed = pressed;
        item.down_time = down_time;
        item.display_x = x.round() as i32;
        item.display_y = y.round() as i32;
        item.tool_type = ToolType::Touchpad;
        item.device_id = self.device_id;
        event.add_pointer_item(item);
        event.pointer_id = 0;
        event.pointer_action = action;
        event.action_time = time_us;
    }
}

impl TransformProcessor for TouchpadTransformProcessor {
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        _ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        use RawInputEvent as R;
        let action = match *raw {
            R::TouchpadDown { slot, x, y, pressure, time_us, .. } => {
                Some(self.contact_down(slot, x, y, pressure, time_us))
            }
            R::TouchpadContactMotion { slot, x, y, pressure, time_us, .. } => {
                Some(self.contact_motion(slot, x, y, pressure, time_us)?)
            }
            R::TouchpadUp { slot, time_us, .. } => Some(self.contact_up(slot, time_us)?),
            R::GestureSwipeBegin { fingers, time_us, .. } => {
                Some(self.begin_gesture(Gesture::Swipe { x: 0.0, y: 0.0 }, fingers, time_us))
            }
            R::GestureSwipeUpdate { fingers, dx, dy, time_us, .. } => match self.gesture {
                Some(Gesture::Swipe { x, y }) => {
                    self.gesture = Some(Gesture::Swipe { x: x + dx, y: y + dy });
                    self.pointer_event.finger_count = fingers;
                    self.emit_gesture(PointerAction::SwipeUpdate, true, time_us);
                    Some(PointerAction::SwipeUpdate)
                }
                _ => {
                    debug!(device_id = self.device_id, "swipe update without begin ignored");
                    None
                }
            },
            R::GestureSwipeEnd { cancelled, time_us, .. } => self.end_gesture(cancelled, time_us),
            R::GesturePinchBegin { fingers, time_us, .. } => {
                Some(self.begin_gesture(Gesture::Pinch { rotation: 0.0 }, fingers, time_us))
            }
            R::GesturePinchUpdate { fingers, scale, angle_delta, time_us, .. } => match self.gesture {
                Some(Gesture::Pinch { rotation }) => {
                    let rotation = rotation + angle_delta;
                    self.gesture = Some(Gesture::Pinch { rotation });
                    self.pointer_event.finger_count = fingers;
                    self.emit_gesture(PointerAction::AxisUpdate, true, time_us);
                    self.pointer_event.set_axis_value(AxisType::Pinch, scale);
                    self.pointer_event.set_axis_value(AxisType::Rotate, rotation);
                    Some(PointerAction::AxisUpdate)
                }
                _ => {
                    debug!(device_id = self.device_id, "pinch update without begin ignored");
                    None
                }
            },
            R::GesturePinchEnd { cancelled, time_us, .. } => self.end_gesture(cancelled, time_us),
            _ => return Err(TransformError::Unsupported("touchpad")),
        };
        Ok(action)
    }

    fn pointer_event(&self) -> &PointerEvent {
        &self.pointer_event
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::transform::test_support::one_display;
    use crate::transform::{CursorPosition, NoopKnuckleClassifier, PointerSettings};

    fn run(
        p: &mut TouchpadTransformProcessor,
        raw: RawInputEvent,
    ) -> Result<Option<PointerAction>, TransformError> {
        let displays = one_display(100, 100);
        let mut cursor = CursorPosition::UNSET;
        let settings = PointerSettings::default();
        let knuckle = NoopKnuckleClassifier;
        let mut ctx = TransformContext {
            displays: &displays,
            cursor: &mut cursor,
            settings: &settings,
            knuckle: &knuckle,
            now: Instant::now(),
        };
        p.normalize(&raw, &mut ctx)
    }

    fn down(slot: i32, x: f64) -> RawInputEvent {
        RawInputEvent::TouchpadDown {
            device_id: 4,
            slot,
            x,
            y: 10.0,
            pressure: 0.3,
            time_us: 100,
        }
    }

    #[test]
    fn test_two_finger_contacts_lifecycle() {
        // Arrange
        let mut p = TouchpadTransformProcessor::new(4);

        // Act
        run(&mut p, down(0, 10.0)).expect("first down");
        run(&mut p, down(1, 40.0)).expect("second down");
        let second = p.pointer_event().clone();
        let up = run(
            &mut p,
            RawInputEvent::TouchpadUp {
                device_id: 4,
                slot: 0,
                time_us: 200,
            },
        )
        .expect("up");
        let up_event = p.pointer_event().clone();

        // Assert
        assert_eq!(second.pointer_action, PointerAction::Down);
        assert_eq!(second.pointer_id, 1);
        assert_eq!(second.pointer_items().len(), 2);
        assert_eq!(second.finger_count, 2);
        assert_eq!(second.source_type, SourceType::Touchpad);
        assert!(second.is_valid());
        assert_eq!(up, Some(PointerAction::Up));
        assert!(!up_event.pointer_item(0).expect("released item").pressed);
        assert!(up_event.is_valid());
    }

    #[test]
    fn test_released_contact_is_gone_from_next_event() {
        let mut p = TouchpadTransformProcessor::new(4);
        run(&mut p, down(0, 10.0)).expect("down");
        run(&mut p, down(1, 20.0)).expect("down");
        run(&mut p, RawInputEvent::TouchpadUp { device_id: 4, slot: 0, time_us: 1 }).expect("up");

        run(
            &mut p,
            RawInputEvent::TouchpadContactMotion {
                device_id: 4,
                slot: 1,
                x: 25.0,
                y: 10.0,
                pressure: 0.3,
                time_us: 2,
            },
        )
        .expect("move");

        assert_eq!(p.pointer_event().pointer_ids(), vec![1]);
    }

    #[test]
    fn test_motion_for_unknown_slot_fails() {
        let mut p = TouchpadTransformProcessor::new(4);

        let result = run(&mut p, RawInputEvent::TouchpadUp { device_id: 4, slot: 7, time_us: 1 });

        assert_eq!(result, Err(TransformError::UnknownSlot(7)));
    }

    #[test]
    fn test_swipe_accumulates_offset() {
        // Arrange
        let mut p = TouchpadTransformProcessor::new(4);

        // Act
        let begin = run(&mut p, RawInputEvent::GestureSwipeBegin { device_id: 4, fingers: 3, time_us: 0 });
        for _ in 0..3 {
            run(
                &mut p,
                RawInputEvent::GestureSwipeUpdate {
                    device_id: 4,
                    fingers: 3,
                    dx: 10.0,
                    dy: -2.0,
                    time_us: 5,
                },
            )
            .expect("update");
        }
        let update = p.pointer_event().clone();
        let end = run(&mut p, RawInputEvent::GestureSwipeEnd { device_id: 4, cancelled: false, time_us: 9 });

        // Assert
        assert_eq!(begin, Ok(Some(PointerAction::SwipeBegin)));
        assert_eq!(update.pointer_action, PointerAction::SwipeUpdate);
        assert_eq!(update.finger_count, 3);
        let item = update.pointer_item(0).expect("item");
        assert_eq!((item.display_x, item.display_y), (30, -6));
        assert_eq!(end, Ok(Some(PointerAction::SwipeEnd)));
    }

    #[test]
    fn test_pinch_reports_scale_and_accumulated_rotation() {
        let mut p = TouchpadTransformProcessor::new(4);
        run(&mut p, RawInputEvent::GesturePinchBegin { device_id: 4, fingers: 2, time_us: 0 }).expect("begin");
        assert_eq!(p.pointer_event().axis_value(AxisType::Pinch), Some(1.0));

        for scale in [1.2, 1.5] {
            run(
                &mut p,
                RawInputEvent::GesturePinchUpdate {
                    device_id: 4,
                    fingers: 2,
                    scale,
                    angle_delta: 5.0,
                    time_us: 1,
                },
            )
            .expect("update");
        }

        let event = p.pointer_event();
        assert_eq!(event.pointer_action, PointerAction::AxisUpdate);
        assert_eq!(event.axis_value(AxisType::Pinch), Some(1.5));
        assert_eq!(event.axis_value(AxisType::Rotate), Some(10.0));
    }

    #[test]
    fn test_cancelled_pinch_ends_with_cancel() {
        let mut p = TouchpadTransformProcessor::new(4);
        run(&mut p, RawInputEvent::GesturePinchBegin { device_id: 4, fingers: 2, time_us: 0 }).expect("begin");

        let end = run(&mut p, RawInputEvent::GesturePinchEnd { device_id: 4, cancelled: true, time_us: 1 });

        assert_eq!(end, Ok(Some(PointerAction::Cancel)));
    }

    #[test]
    fn test_gesture_update_without_begin_is_ignored() {
        let mut p = TouchpadTransformProcessor::new(4);

        let result = run(
            &mut p,
            RawInputEvent::GesturePinchUpdate {
                device_id: 4,
                fingers: 2,
                scale: 2.0,
                angle_delta: 0.0,
                time_us: 1,
            },
        );

        assert_eq!(result, Ok(None));
    }
}
