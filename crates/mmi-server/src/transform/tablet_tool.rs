//! Stylus (tablet tool) processor.
//!
//! A pen behaves like a single touch contact with extra axes.  Only
//! contact with the surface produces events; hovering is tracked but not
//! reported.
//!
//! | Raw sample                       | Action   |
//! |----------------------------------|----------|
//! | tip down                         | `DOWN`   |
//! | axis motion, tip down            | `MOVE` (pressure, tilt) |
//! | axis motion, hovering            | nothing  |
//! | tip up                           | `UP`     |
//! | leaves proximity with tip down   | `CANCEL` |

use mmi_core::domain::{DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType};
use tracing::debug;

use super::{TransformContext, TransformError, TransformProcessor};
use crate::infrastructure::input_source::RawInputEvent;

pub struct TabletToolTransformProcessor {
    device_id: DeviceId,
    pointer_event: PointerEvent,
    tip_down: bool,
    in_proximity: bool,
}

impl TabletToolTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut pointer_event = PointerEvent::new(SourceType::TouchScreen);
        pointer_event.device_id = device_id;
        pointer_event.pointer_id = 0;
        Self {
            device_id,
            pointer_event,
            tip_down: false,
            in_proximity: false,
        }
    }

    fn lift(&mut self, action: PointerAction, time_us: i64) -> PointerAction {
        self.tip_down = false;
        if let Some(item) = self.pointer_event.pointer_item_mut(0) {
            item.pressed = false;
        }
        self.pointer_event.pointer_action = action;
        self.pointer_event.action_time = time_us;
        action
    }
}

impl TransformProcessor for TabletToolTransformProcessor {
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        use RawInputEvent as R;
        match *raw {
            R::TabletToolProximity { in_proximity, time_us, .. } => {
                self.in_proximity = in_proximity;
                if !in_proximity && self.tip_down {
                    debug!(device_id = self.device_id, "pen left proximity while down");
                    return Ok(Some(self.lift(PointerAction::Cancel, time_us)));
                }
                Ok(None)
            }
            R::TabletToolTip { down: true, x, y, pressure, time_us, .. } => {
                let (px, py) = (x.round() as i32, y.round() as i32);
                let display = ctx
                    .displays
                    .display_at(px, py)
                    .or_else(|| ctx.displays.first_display())
                    .ok_or(TransformError::NoDisplay)?;
                self.in_proximity = true;
                self.tip_down = true;

                let mut item = PointerItem::new(0);
                item.pressed = true;
                item.down_time = time_us;
                item.display_x = px;
                item.display_y = py;
                item.pressure = pressure;
                item.tool_type = ToolType::Pen;
                item.device_id = self.device_id;
                let event = &mut self.pointer_event;
                event.clear_pointer_items();
                event.add_pointer_item(item);
                event.target_display_id = display.id;
                event.pointer_action = PointerAction::Down;
                event.action_start_time = time_us;
                event.action_time = time_us;
                Ok(Some(PointerAction::Down))
            }
            R::TabletToolTip { down: false, time_us, .. } => {
                if !self.tip_down {
                    return Ok(None);
                }
                Ok(Some(self.lift(PointerAction::Up, time_us)))
            }
            R::TabletToolAxis { x, y, pressure, tilt_x, tilt_y, time_us, .. } => {
                if !self.tip_down {
                    return Ok(None);
                }
                let event = &mut self.pointer_event;
                if let Some(item) = event.pointer_item_mut(0) {
                    item.display_x = x.round() as i32;
                    item.display_y = y.round() as i32;
                    item.pressure = pressure;
                    item.tilt_x = tilt_x;
                    item.tilt_y = tilt_y;
                }
                event.pointer_action = PointerAction::Move;
                event.action_time = time_us;
                Ok(Some(PointerAction::Move))
            }
            _ => Err(TransformError::Unsupported("tablet tool")),
        }
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
        p: &mut TabletToolTransformProcessor,
        raw: RawInputEvent,
    ) -> Result<Option<PointerAction>, TransformError> {
        let displays = one_display(2000, 1200);
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

    fn axis(x: f64, pressure: f64) -> RawInputEvent {
        RawInputEvent::TabletToolAxis {
            device_id: 6,
            x,
            y: 300.0,
            pressure,
            tilt_x: 12.0,
            tilt_y: -3.0,
            time_us: 5,
        }
    }

    fn tip(down: bool) -> RawInputEvent {
        RawInputEvent::TabletToolTip {
            device_id: 6,
            down,
            x: 400.0,
            y: 300.0,
            pressure: 0.2,
            time_us: 1,
        }
    }

    #[test]
    fn test_hover_motion_emits_nothing() {
        let mut p = TabletToolTransformProcessor::new(6);
        run(&mut p, RawInputEvent::TabletToolProximity { device_id: 6, in_proximity: true, time_us: 0 })
            .expect("proximity");

        assert_eq!(run(&mut p, axis(410.0, 0.0)), Ok(None));
    }

    #[test]
    fn test_stroke_reports_pressure_and_tilt() {
        // Arrange
        let mut p = TabletToolTransformProcessor::new(6);

        // Act
        let down = run(&mut p, tip(true)).expect("down");
        let moved = run(&mut p, axis(420.0, 0.8)).expect("move");
        let move_event = p.pointer_event().clone();
        let up = run(&mut p, tip(false)).expect("up");

        // Assert
        assert_eq!(down, Some(PointerAction::Down));
        assert_eq!(moved, Some(PointerAction::Move));
        let item = move_event.pointer_item(0).expect("item");
        assert_eq!(item.tool_type, ToolType::Pen);
        assert_eq!(item.display_x, 420);
        assert_eq!(item.pressure, 0.8);
        assert_eq!((item.tilt_x, item.tilt_y), (12.0, -3.0));
        assert!(move_event.is_valid());
        assert_eq!(up, Some(PointerAction::Up));
        assert!(p.pointer_event().is_valid());
    }

    #[test]
    fn test_leaving_proximity_while_down_cancels() {
        let mut p = TabletToolTransformProcessor::new(6);
        run(&mut p, tip(true)).expect("down");

        let action = run(
            &mut p,
            RawInputEvent::TabletToolProximity { device_id: 6, in_proximity: false, time_us: 9 },
        );

        assert_eq!(action, Ok(Some(PointerAction::Cancel)));
        assert_eq!(run(&mut p, tip(false)), Ok(None));
    }
}
