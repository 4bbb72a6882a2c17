//! Monitor registry: passive fan-out after interception.
//!
//! Every matching monitor receives every event; monitors never stop the
//! event from reaching its window.  The one exception is a *consumed
//! gesture*: a monitor that fully handles a touch gesture (a system swipe,
//! say) answers `MarkConsumed(event_id)` for an event of that gesture.  The
//! window then gets a single `CANCEL` in place of the next event, and the
//! rest of the gesture is withheld from it until the last finger lifts.
//! Gestures are tracked per device and source, so a touchpad and a touch
//! screen in use at the same time do not disturb each other.
//!
//! Sends to monitors are tracked by the ANR manager under
//! [`AnrEventType::Monitor`]; a monitor that stopped acknowledging is skipped.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mmi_core::domain::{AnrEventType, DeviceId, DeviceTags, EventTypeMask, HandlerType, SourceType};
use mmi_core::protocol::InputHandlerRequest;
use mmi_core::{current_time_us, KeyEvent, MmiMessage, PointerAction, PointerEvent};
use tracing::{debug, info, warn};

use super::anr::AnrManager;
use super::handler::{HandlerCollection, HandlerError, SessionHandler};
use super::session::{send_message, SessionId, SessionLostListener, SessionTransmitter};

/// What the pipeline should do with a pointer event after the monitors saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Dispatch normally.
    Dispatch,
    /// A monitor consumed the gesture: dispatch this event as `CANCEL`.
    DispatchCancel,
    /// The gesture was consumed earlier; withhold the event.
    Suppress,
}

/// Touch gesture bookkeeping for `MarkConsumed`.
#[derive(Debug, Default)]
struct ConsumptionState {
    /// Ids of the events of the running gesture sent to monitors.
    event_ids: BTreeSet<i32>,
    consumed: bool,
    cancel_sent: bool,
}

impl ConsumptionState {
    fn reset(&mut self) {
        self.event_ids.clear();
        self.consumed = false;
        self.cancel_sent = false;
    }
}

type GestureKey = (DeviceId, SourceType);

pub struct MonitorRegistry {
    handlers: Mutex<HandlerCollection>,
    consumption: Mutex<HashMap<GestureKey, ConsumptionState>>,
    transmitter: Arc<dyn SessionTransmitter>,
    anr: Arc<AnrManager>,
}

impl MonitorRegistry {
    pub fn new(max_monitors: usize, transmitter: Arc<dyn SessionTransmitter>, anr: Arc<AnrManager>) -> Self {
        Self {
            handlers: Mutex::new(HandlerCollection::new(max_monitors)),
            consumption: Mutex::new(HashMap::new()),
            transmitter,
            anr,
        }
    }

    pub fn add_monitor(&self, session: SessionId, req: &InputHandlerRequest) -> Result<(), HandlerError> {
        if req.handler_type != HandlerType::Monitor {
            return Err(HandlerError::WrongType(req.handler_type));
        }
        self.handlers().add(SessionHandler::from_request(session, req))?;
        info!(session, event_types = req.event_types.0, "monitor added");
        Ok(())
    }

    pub fn remove_monitor(&self, session: SessionId, req: &InputHandlerRequest) -> Result<(), HandlerError> {
        self.handlers().remove(session, req.event_types)?;
        info!(session, remaining = req.event_types.0, "monitor removed");
        Ok(())
    }

    /// Marks the running touch gesture that contains `event_id` consumed by
    /// `session`'s monitor.
    ///
    /// Ignored unless `event_id` belongs to a running gesture and the
    /// session has a monitor.
    pub fn mark_consumed(&self, session: SessionId, event_id: i32) {
        if !self.handlers().contains_session(session) {
            debug!(session, event_id, "mark consumed from session without monitor");
            return;
        }
        let mut gestures = self.consumption();
        let Some(((device_id, source), state)) = gestures
            .iter_mut()
            .find(|(_, state)| state.event_ids.contains(&event_id))
        else {
            debug!(session, event_id, "mark consumed for event outside running gesture");
            return;
        };
        if !state.consumed {
            info!(session, event_id, device_id = *device_id, ?source, "gesture consumed by monitor");
        }
        state.consumed = true;
    }

    /// Sends `event` to every matching monitor and decides how it continues.
    pub fn handle_pointer_event(&self, event: &PointerEvent, capabilities: DeviceTags) -> MonitorVerdict {
        let is_touch = matches!(event.source_type, SourceType::TouchScreen | SourceType::Touchpad);
        let verdict = if is_touch {
            self.update_gesture(event)
        } else {
            MonitorVerdict::Dispatch
        };

        let class = EventTypeMask::class_of(event.source_type);
        let msg = MmiMessage::ReportPointerEvent {
            handler_type: HandlerType::Monitor,
            event: event.clone(),
        };
        self.fan_out(class, capabilities, event.id, &msg);
        verdict
    }

    pub fn handle_key_event(&self, event: &KeyEvent, capabilities: DeviceTags) {
        let msg = MmiMessage::ReportKeyEvent {
            handler_type: HandlerType::Monitor,
            event: event.clone(),
        };
        self.fan_out(EventTypeMask::KEY, capabilities, event.id, &msg);
    }

    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers().is_empty()
    }

    fn update_gesture(&self, event: &PointerEvent) -> MonitorVerdict {
        let mut gestures = self.consumption();
        let state = gestures.entry((event.device_id, event.source_type)).or_default();
        let first_contact = event.pointer_action == PointerAction::Down && event.pointer_items().len() == 1;
        if first_contact {
            state.reset();
        }
        state.event_ids.insert(event.id);

        let gesture_over = event.pointer_action.is_terminal()
            && event.pointer_items().iter().all(|i| !i.pressed);
        let verdict = match (state.consumed, state.cancel_sent) {
            (false, _) => MonitorVerdict::Dispatch,
            (true, false) => {
                state.cancel_sent = true;
                MonitorVerdict::DispatchCancel
            }
            (true, true) => MonitorVerdict::Suppress,
        };
        if gesture_over {
            state.reset();
        }
        verdict
    }

    fn fan_out(&self, class: u32, capabilities: DeviceTags, event_id: i32, msg: &MmiMessage) {
        let targets: Vec<SessionId> = self
            .handlers()
            .iter()
            .filter(|h| h.accepts(class, capabilities))
            .map(|h| h.session)
            .collect();

        for session in targets {
            let now = current_time_us();
            if self.anr.trigger_anr(session, AnrEventType::Monitor, now) {
                debug!(session, event_id, "monitor not responding; event skipped");
                continue;
            }
            if send_message(self.transmitter.as_ref(), session, msg) {
                self.anr.record(session, AnrEventType::Monitor, event_id, now);
            } else {
                warn!(session, event_id, "failed to send event to monitor");
            }
        }
    }

    fn handlers(&self) -> MutexGuard<'_, HandlerCollection> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn consumption(&self) -> MutexGuard<'_, HashMap<GestureKey, ConsumptionState>> {
        self.consumption.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLostListener for MonitorRegistry {
    fn on_session_lost(&self, session: SessionId) {
        if self.handlers().purge_session(session) > 0 {
            info!(session, "monitors purged for lost session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mmi_core::domain::PointerItem;

    use super::*;
    use crate::application::anr::LoggingAnrObserver;
    use crate::application::session::test_support::RecordingTransmitter;

    fn request(event_types: u32) -> InputHandlerRequest {
        InputHandlerRequest {
            handler_type: HandlerType::Monitor,
            event_types: EventTypeMask(event_types),
            priority: 0,
            device_tags: DeviceTags(DeviceTags::ALL),
        }
    }

    fn setup() -> (MonitorRegistry, Arc<RecordingTransmitter>, Arc<AnrManager>) {
        let tx = Arc::new(RecordingTransmitter::with_sessions(&[(1, 100), (2, 200)]));
        let anr = Arc::new(AnrManager::new(Duration::from_secs(5), Arc::new(LoggingAnrObserver)));
        let registry = MonitorRegistry::new(
            16,
            Arc::clone(&tx) as Arc<dyn SessionTransmitter>,
            Arc::clone(&anr),
        );
        (registry, tx, anr)
    }

    fn touch(id: i32, action: PointerAction, pressed: bool) -> PointerEvent {
        let mut event = PointerEvent::new(SourceType::TouchScreen);
        event.id = id;
        event.pointer_id = 0;
        event.pointer_action = action;
        event.add_pointer_item(PointerItem {
            pressed,
            ..PointerItem::new(0)
        });
        event
    }

    #[test]
    fn test_every_matching_monitor_is_notified() {
        // Arrange
        let (registry, tx, anr) = setup();
        registry.add_monitor(1, &request(EventTypeMask::ALL)).expect("add");
        registry.add_monitor(2, &request(EventTypeMask::TOUCH)).expect("add");

        // Act
        let verdict = registry.handle_pointer_event(
            &touch(5, PointerAction::Down, true),
            DeviceTags(DeviceTags::TOUCH),
        );

        // Assert
        assert_eq!(verdict, MonitorVerdict::Dispatch);
        assert_eq!(tx.sent().len(), 2);
        assert_eq!(anr.pending_count(1, AnrEventType::Monitor), 1);
        assert_eq!(anr.pending_count(2, AnrEventType::Monitor), 1);
    }

    #[test]
    fn test_key_monitor_ignores_touch() {
        let (registry, tx, _) = setup();
        registry.add_monitor(1, &request(EventTypeMask::KEY)).expect("add");

        registry.handle_pointer_event(&touch(5, PointerAction::Down, true), DeviceTags(DeviceTags::TOUCH));
        registry.handle_key_event(&KeyEvent::new(), DeviceTags::keyboard());

        let sent = tx.sent_to(1);
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], MmiMessage::ReportKeyEvent { .. }));
    }

    #[test]
    fn test_consumed_gesture_cancels_once_then_suppresses_until_up() {
        // Arrange
        let (registry, _, _) = setup();
        registry.add_monitor(1, &request(EventTypeMask::TOUCH)).expect("add");
        let tags = DeviceTags(DeviceTags::TOUCH);
        registry.handle_pointer_event(&touch(1, PointerAction::Down, true), tags);

        // Act
        registry.mark_consumed(1, 1);
        let first = registry.handle_pointer_event(&touch(2, PointerAction::Move, true), tags);
        let second = registry.handle_pointer_event(&touch(3, PointerAction::Move, true), tags);
        let up = registry.handle_pointer_event(&touch(4, PointerAction::Up, false), tags);
        let next_gesture = registry.handle_pointer_event(&touch(5, PointerAction::Down, true), tags);

        // Assert
        assert_eq!(first, MonitorVerdict::DispatchCancel);
        assert_eq!(second, MonitorVerdict::Suppress);
        assert_eq!(up, MonitorVerdict::Suppress);
        assert_eq!(next_gesture, MonitorVerdict::Dispatch);
    }

    #[test]
    fn test_touchpad_contact_does_not_reset_consumed_touch_gesture() {
        // Arrange: a consumed touch screen gesture on device 1.
        let (registry, _, _) = setup();
        registry.add_monitor(1, &request(EventTypeMask::ALL)).expect("add");
        let mut screen_down = touch(1, PointerAction::Down, true);
        screen_down.device_id = 1;
        registry.handle_pointer_event(&screen_down, DeviceTags(DeviceTags::TOUCH));
        registry.mark_consumed(1, 1);

        // Act: a finger lands on the touchpad (device 9) mid-gesture.
        let mut pad_down = touch(2, PointerAction::Down, true);
        pad_down.source_type = SourceType::Touchpad;
        pad_down.device_id = 9;
        let pad = registry.handle_pointer_event(&pad_down, DeviceTags(DeviceTags::POINTER));
        let mut screen_move = touch(3, PointerAction::Move, true);
        screen_move.device_id = 1;
        let screen = registry.handle_pointer_event(&screen_move, DeviceTags(DeviceTags::TOUCH));

        // Assert
        assert_eq!(pad, MonitorVerdict::Dispatch);
        assert_eq!(screen, MonitorVerdict::DispatchCancel);
    }

    #[test]
    fn test_mark_consumed_for_unknown_event_is_ignored() {
        let (registry, _, _) = setup();
        registry.add_monitor(1, &request(EventTypeMask::TOUCH)).expect("add");
        let tags = DeviceTags(DeviceTags::TOUCH);
        registry.handle_pointer_event(&touch(1, PointerAction::Down, true), tags);

        registry.mark_consumed(1, 999);
        registry.mark_consumed(2, 1);

        assert_eq!(
            registry.handle_pointer_event(&touch(2, PointerAction::Move, true), tags),
            MonitorVerdict::Dispatch
        );
    }

    #[test]
    fn test_unresponsive_monitor_is_skipped() {
        // Arrange
        let (registry, tx, anr) = setup();
        registry.add_monitor(1, &request(EventTypeMask::KEY)).expect("add");
        anr.record(1, AnrEventType::Monitor, 1, 0);

        // Act
        registry.handle_key_event(&KeyEvent::new(), DeviceTags::keyboard());

        // Assert
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_session_lost_purges_monitor() {
        let (registry, _, _) = setup();
        registry.add_monitor(1, &request(EventTypeMask::ALL)).expect("add");

        registry.on_session_lost(1);

        assert!(registry.is_empty());
    }
}
