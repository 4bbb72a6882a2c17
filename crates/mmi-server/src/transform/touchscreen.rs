//! Touchscreen processor.
//!
//! Every finger on the screen is a contact identified by its slot.  The
//! running event always lists every contact still on the glass plus, for an
//! `UP` or `CANCEL`, the contact that just left; that one is dropped before
//! the next sample.
//!
//! # Knuckle detection
//!
//! Some panels can tell a knuckle from a fingertip.  The decision comes from
//! a [`KnuckleClassifier`] passed in through the [`TransformContext`]; it is
//! asked once per contact at `DOWN` and the answer sticks until `UP`.  The
//! default [`NoopKnuckleClassifier`] reports every contact as a finger.

use std::collections::BTreeMap;

use mmi_core::domain::{DeviceId, PointerAction, PointerEvent, PointerItem, SourceType, ToolType};

use super::{TransformContext, TransformError, TransformProcessor};
use crate::infrastructure::input_source::RawInputEvent;

/// Shape of a new contact, as seen by a [`KnuckleClassifier`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSample {
    pub pressure: f64,
    /// Contact ellipse major axis, in pixels.
    pub major: f64,
}

/// Refines the tool type of a new touchscreen contact.
pub trait KnuckleClassifier: Send + Sync {
    /// Name used to select the classifier in the configuration.
    fn name(&self) -> &str;

    /// Tool type for a contact that just went down.
    fn classify(&self, contact: &ContactSample) -> ToolType;
}

/// Classifier used when no plugin is configured; every contact is a finger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKnuckleClassifier;

impl KnuckleClassifier for NoopKnuckleClassifier {
    fn name(&self) -> &str {
        "noop"
    }

    fn classify(&self, _contact: &ContactSample) -> ToolType {
        ToolType::Finger
    }
}

pub struct TouchTransformProcessor {
    device_id: DeviceId,
    pointer_event: PointerEvent,
    contacts: BTreeMap<i32, PointerItem>,
}

impl TouchTransformProcessor {
    pub fn new(device_id: DeviceId) -> Self {
        let mut pointer_event = PointerEvent::new(SourceType::TouchScreen);
        pointer_event.device_id = device_id;
        Self {
            device_id,
            pointer_event,
            contacts: BTreeMap::new(),
        }
    }

    fn emit(&mut self, slot: i32, action: PointerAction, time_us: i64) {
        let event = &mut self.pointer_event;
        event.clear_pointer_items();
        for item in self.contacts.values() {
            event.add_pointer_item(item.clone());
        }
        event.pointer_id = slot;
        event.pointer_action = action;
        event.action_time = time_us;
        event.finger_count = self.contacts.values().filter(|i| i.pressed).count() as i32;
    }

    fn release(&mut self, slot: i32, action: PointerAction, time_us: i64) -> Result<PointerAction, TransformError> {
        let item = self.contacts.get_mut(&slot).ok_or(TransformError::UnknownSlot(slot))?;
        item.pressed = false;
        self.emit(slot, action, time_us);
        self.contacts.remove(&slot);
        Ok(action)
    }
}

impl TransformProcessor for TouchTransformProcessor {
    fn normalize(
        &mut self,
        raw: &RawInputEvent,
        ctx: &mut TransformContext<'_>,
    ) -> Result<Option<PointerAction>, TransformError> {
        use RawInputEvent as R;
        let action = match *raw {
            R::TouchDown { slot, x, y, pressure, major, time_us, .. } => {
                let (px, py) = (x.round() as i32, y.round() as i32);
                let display = ctx
                    .displays
                    .display_at(px, py)
                    .or_else(|| ctx.displays.first_display())
                    .ok_or(TransformError::NoDisplay)?;
                self.pointer_event.target_display_id = display.id;

                let mut item = PointerItem::new(slot);
                item.pressed = true;
                item.down_time = time_us;
                item.display_x = px;
                item.display_y = py;
                item.pressure = pressure;
                item.width = major.round() as i32;
                item.height = major.round() as i32;
                item.tool_type = ctx.knuckle.classify(&ContactSample { pressure, major });
                item.device_id = self.device_id;
                if self.contacts.is_empty() {
                    self.pointer_event.action_start_time = time_us;
                }
                self.contacts.insert(slot, item);
                self.emit(slot, PointerAction::Down, time_us);
                PointerAction::Down
            }
            R::TouchMotion { slot, x, y, pressure, major, time_us, .. } => {
                let item = self.contacts.get_mut(&slot).ok_or(TransformError::UnknownSlot(slot))?;
                item.display_x = x.round() as i32;
                item.display_y = y.round() as i32;
                item.pressure = pressure;
                item.width = major.round() as i32;
                item.height = major.round() as i32;
                self.emit(slot, PointerAction::Move, time_us);
                PointerAction::Move
            }
            R::TouchUp { slot, time_us, .. } => self.release(slot, PointerAction::Up, time_us)?,
            R::TouchCancel { slot, time_us, .. } => self.release(slot, PointerAction::Cancel, time_us)?,
            _ => return Err(TransformError::Unsupported("touchscreen")),
        };
        Ok(Some(action))
    }

    fn pointer_event(&self) -> &PointerEvent {
        &self.pointer_event
    }
}
