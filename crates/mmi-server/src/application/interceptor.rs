//! Interceptor registry: exclusive, priority-ordered first look at events.
//!
//! At most one interceptor sees each event, the first one in priority order
//! whose event mask and device tags match.  Once an interceptor is picked
//! the event counts as consumed, even if the socket write fails: delivery
//! is best effort, the policy decision is not.

use std::sync::{Arc, Mutex, PoisonError};

use mmi_core::domain::{DeviceTags, EventTypeMask, HandlerType};
use mmi_core::protocol::InputHandlerRequest;
use mmi_core::{KeyEvent, MmiMessage, PointerEvent};
use tracing::{debug, info, warn};

use super::handler::{HandlerCollection, HandlerError, SessionHandler};
use super::session::{send_message, SessionId, SessionLostListener, SessionTransmitter};

pub struct InterceptorRegistry {
    handlers: Mutex<HandlerCollection>,
    transmitter: Arc<dyn SessionTransmitter>,
}

impl InterceptorRegistry {
    pub fn new(max_interceptors: usize, transmitter: Arc<dyn SessionTransmitter>) -> Self {
        Self {
            handlers: Mutex::new(HandlerCollection::new(max_interceptors)),
            transmitter,
        }
    }

    pub fn add_interceptor(&self, session: SessionId, req: &InputHandlerRequest) -> Result<(), HandlerError> {
        if req.handler_type != HandlerType::Interceptor {
            return Err(HandlerError::WrongType(req.handler_type));
        }
        let handler = SessionHandler::from_request(session, req);
        self.lock().add(handler)?;
        info!(session, priority = req.priority, event_types = req.event_types.0, "interceptor added");
        Ok(())
    }

    /// Removes the session's interceptor; `req.event_types` is what the session still wants.
    pub fn remove_interceptor(&self, session: SessionId, req: &InputHandlerRequest) -> Result<(), HandlerError> {
        self.lock().remove(session, req.event_types)?;
        info!(session, remaining = req.event_types.0, "interceptor removed");
        Ok(())
    }

    /// Offers a pointer event; returns `true` if an interceptor took it.
    pub fn handle_pointer_event(&self, event: &PointerEvent, capabilities: DeviceTags) -> bool {
        let class = EventTypeMask::class_of(event.source_type);
        let Some(target) = self.select(class, capabilities) else {
            return false;
        };
        let msg = MmiMessage::ReportPointerEvent {
            handler_type: HandlerType::Interceptor,
            event: event.clone(),
        };
        self.deliver(target, event.id, &msg);
        true
    }

    /// Offers a key event; returns `true` if an interceptor took it.
    pub fn handle_key_event(&self, event: &KeyEvent, capabilities: DeviceTags) -> bool {
        let Some(target) = self.select(EventTypeMask::KEY, capabilities) else {
            return false;
        };
        let msg = MmiMessage::ReportKeyEvent {
            handler_type: HandlerType::Interceptor,
            event: event.clone(),
        };
        self.deliver(target, event.id, &msg);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn select(&self, class: u32, capabilities: DeviceTags) -> Option<SessionId> {
        self.lock()
            .iter()
            .find(|h| h.accepts(class, capabilities))
            .map(|h| h.session)
    }

    fn deliver(&self, session: SessionId, event_id: i32, msg: &MmiMessage) {
        if send_message(self.transmitter.as_ref(), session, msg) {
            debug!(session, event_id, "event intercepted");
        } else {
            warn!(session, event_id, "interceptor unreachable; event still consumed");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandlerCollection> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionLostListener for InterceptorRegistry {
    fn on_session_lost(&self, session: SessionId) {
        let removed = self.lock().purge_session(session);
        if removed > 0 {
            info!(session, "interceptors purged for lost session");
        }
    }
}

#[cfg(test)]
mod tests {
    use mmi_core::domain::{PointerAction, PointerItem, SourceType};

    use super::*;
    use crate::application::session::test_support::RecordingTransmitter;

    fn request(priority: i32, event_types: u32) -> InputHandlerRequest {
        InputHandlerRequest {
            handler_type: HandlerType::Interceptor,
            event_types: EventTypeMask(event_types),
            priority,
            device_tags: DeviceTags(DeviceTags::ALL),
        }
    }

    fn touch_event() -> PointerEvent {
        let mut event = PointerEvent::new(SourceType::TouchScreen);
        event.id = 11;
        event.pointer_id = 0;
        event.pointer_action = PointerAction::Down;
        event.add_pointer_item(PointerItem {
            pressed: true,
            ..PointerItem::new(0)
        });
        event
    }

    fn setup() -> (InterceptorRegistry, Arc<RecordingTransmitter>) {
        let tx = Arc::new(RecordingTransmitter::with_sessions(&[(1, 100), (2, 200), (3, 300)]));
        let registry = InterceptorRegistry::new(16, Arc::clone(&tx) as Arc<dyn SessionTransmitter>);
        (registry, tx)
    }

    #[test]
    fn test_lowest_priority_value_wins_regardless_of_registration_order() {
        // Arrange
        let (registry, tx) = setup();
        registry.add_interceptor(3, &request(300, EventTypeMask::ALL)).expect("add");
        registry.add_interceptor(1, &request(100, EventTypeMask::ALL)).expect("add");
        registry.add_interceptor(2, &request(200, EventTypeMask::ALL)).expect("add");

        // Act
        let consumed = registry.handle_pointer_event(&touch_event(), DeviceTags(DeviceTags::TOUCH));

        // Assert
        assert!(consumed);
        let sent = tx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
    }

    #[test]
    fn test_equal_priority_first_registered_wins() {
        let (registry, tx) = setup();
        registry.add_interceptor(2, &request(100, EventTypeMask::ALL)).expect("add");
        registry.add_interceptor(1, &request(100, EventTypeMask::ALL)).expect("add");

        registry.handle_pointer_event(&touch_event(), DeviceTags(DeviceTags::TOUCH));

        assert_eq!(tx.sent()[0].0, 2);
    }

    #[test]
    fn test_event_class_filter_skips_to_next() {
        // Arrange
        let (registry, tx) = setup();
        registry.add_interceptor(1, &request(100, EventTypeMask::KEY)).expect("add");
        registry.add_interceptor(2, &request(200, EventTypeMask::TOUCH)).expect("add");

        // Act
        registry.handle_pointer_event(&touch_event(), DeviceTags(DeviceTags::TOUCH));

        // Assert
        let sent = tx.sent();
        assert_eq!(sent[0].0, 2);
        assert!(matches!(
            &sent[0].1,
            MmiMessage::ReportPointerEvent { handler_type: HandlerType::Interceptor, event } if event.id == 11
        ));
    }

    #[test]
    fn test_failed_send_still_consumes() {
        let (registry, tx) = setup();
        tx.fail_sends_to(1);
        registry.add_interceptor(1, &request(100, EventTypeMask::ALL)).expect("add");

        let consumed = registry.handle_key_event(&KeyEvent::new(), DeviceTags::keyboard());

        assert!(consumed);
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_no_match_is_not_consumed() {
        let (registry, _) = setup();
        registry.add_interceptor(1, &request(100, EventTypeMask::POINTER)).expect("add");

        assert!(!registry.handle_key_event(&KeyEvent::new(), DeviceTags::keyboard()));
    }

    #[test]
    fn test_session_lost_falls_through_to_next_interceptor() {
        // Arrange
        let (registry, tx) = setup();
        registry.add_interceptor(1, &request(100, EventTypeMask::ALL)).expect("add");
        registry.add_interceptor(2, &request(200, EventTypeMask::ALL)).expect("add");

        // Act
        registry.on_session_lost(1);
        registry.handle_pointer_event(&touch_event(), DeviceTags(DeviceTags::TOUCH));

        // Assert
        assert_eq!(registry.len(), 1);
        assert_eq!(tx.sent()[0].0, 2);
    }

    #[test]
    fn test_monitor_request_is_rejected() {
        let (registry, _) = setup();
        let mut req = request(0, EventTypeMask::ALL);
        req.handler_type = HandlerType::Monitor;

        assert_eq!(
            registry.add_interceptor(1, &req),
            Err(HandlerError::WrongType(HandlerType::Monitor))
        );
    }
}
