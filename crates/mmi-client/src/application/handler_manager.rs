//! Client-side bookkeeping of interceptors and monitors.
//!
//! # One registration per handler type (for beginners)
//!
//! The service keeps at most one interceptor entry and one monitor entry per
//! session.  A client that installs several local handlers therefore
//! registers their *union*: the OR of their event-type masks and device
//! tags, at the lowest (most urgent) priority among them.  Every add or
//! remove re-sends the union for that handler type.  On removal the message
//! carries what remains, and an empty mask removes the session's entry
//! altogether.
//!
//! When a reported event arrives, the manager fans it out locally to every
//! handler of that type whose own mask and tags match.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use mmi_core::domain::{DeviceTags, EventTypeMask, HandlerType, MonitorId};
use mmi_core::protocol::InputHandlerRequest;
use mmi_core::{KeyEvent, MmiMessage, PointerEvent};
use tracing::{debug, warn};

use super::sender::{ClientError, MessageSender};

/// Receives events delivered to a local handler or window.
pub trait InputEventConsumer: Send + Sync {
    fn on_key_event(&self, _event: &KeyEvent) {}
    fn on_pointer_event(&self, _event: &PointerEvent) {}
}

struct LocalHandler {
    event_types: EventTypeMask,
    priority: i32,
    device_tags: DeviceTags,
    consumer: Arc<dyn InputEventConsumer>,
}

#[derive(Default)]
struct Handlers {
    next_id: i32,
    interceptors: BTreeMap<i32, LocalHandler>,
    monitors: BTreeMap<i32, LocalHandler>,
}

impl Handlers {
    fn of(&self, handler_type: HandlerType) -> &BTreeMap<i32, LocalHandler> {
        match handler_type {
            HandlerType::Interceptor => &self.interceptors,
            HandlerType::Monitor => &self.monitors,
        }
    }

    fn of_mut(&mut self, handler_type: HandlerType) -> &mut BTreeMap<i32, LocalHandler> {
        match handler_type {
            HandlerType::Interceptor => &mut self.interceptors,
            HandlerType::Monitor => &mut self.monitors,
        }
    }

    /// Registration covering every local handler of `handler_type`.
    fn union(&self, handler_type: HandlerType) -> InputHandlerRequest {
        let handlers = self.of(handler_type);
        InputHandlerRequest {
            handler_type,
            event_types: handlers
                .values()
                .fold(EventTypeMask::default(), |acc, h| acc.union(h.event_types)),
            priority: handlers.values().map(|h| h.priority).min().unwrap_or(0),
            device_tags: DeviceTags(handlers.values().fold(0, |acc, h| acc | h.device_tags.0)),
        }
    }
}

pub struct InputHandlerManager {
    sender: Arc<dyn MessageSender>,
    max_handlers: usize,
    handlers: Mutex<Handlers>,
    // Serializes add/remove so unions reach the service in order.
    updates: tokio::sync::Mutex<()>,
}

impl InputHandlerManager {
    pub fn new(sender: Arc<dyn MessageSender>, max_handlers: usize) -> Self {
        Self {
            sender,
            max_handlers,
            handlers: Mutex::new(Handlers {
                next_id: 1,
                ..Handlers::default()
            }),
            updates: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn add_interceptor(
        &self,
        event_types: EventTypeMask,
        priority: i32,
        device_tags: DeviceTags,
        consumer: Arc<dyn InputEventConsumer>,
    ) -> Result<i32, ClientError> {
        self.add(
            HandlerType::Interceptor,
            LocalHandler {
                event_types,
                priority,
                device_tags,
                consumer,
            },
        )
        .await
    }

    pub async fn remove_interceptor(&self, id: i32) -> Result<(), ClientError> {
        self.remove(HandlerType::Interceptor, id).await
    }

    /// Installs a monitor; the returned id names the subsystem it belongs
    /// to, derived from `event_types`.
    pub async fn add_monitor(
        &self,
        event_types: EventTypeMask,
        device_tags: DeviceTags,
        consumer: Arc<dyn InputEventConsumer>,
    ) -> Result<MonitorId, ClientError> {
        let raw = self
            .add(
                HandlerType::Monitor,
                LocalHandler {
                    event_types,
                    priority: 0,
                    device_tags,
                    consumer,
                },
            )
            .await?;
        Ok(monitor_id(event_types, raw))
    }

    pub async fn remove_monitor(&self, id: MonitorId) -> Result<(), ClientError> {
        self.remove(HandlerType::Monitor, id.raw()).await
    }

    pub fn len(&self, handler_type: HandlerType) -> usize {
        self.lock().of(handler_type).len()
    }

    /// Delivers a reported key event to matching local handlers.
    ///
    /// Returns how many handlers received it.
    pub fn on_key_event(&self, handler_type: HandlerType, event: &KeyEvent) -> usize {
        let consumers = self.matching(handler_type, EventTypeMask::KEY, DeviceTags::keyboard());
        for consumer in &consumers {
            consumer.on_key_event(event);
        }
        consumers.len()
    }

    /// Delivers a reported pointer event to matching local handlers.
    pub fn on_pointer_event(&self, handler_type: HandlerType, event: &PointerEvent) -> usize {
        let consumers = self.matching(
            handler_type,
            EventTypeMask::class_of(event.source_type),
            DeviceTags::for_source(event.source_type),
        );
        for consumer in &consumers {
            consumer.on_pointer_event(event);
        }
        consumers.len()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn add(&self, handler_type: HandlerType, handler: LocalHandler) -> Result<i32, ClientError> {
        let _serial = self.updates.lock().await;
        let (id, request) = {
            let mut handlers = self.lock();
            if handlers.of(handler_type).len() >= self.max_handlers {
                return Err(ClientError::TooManyHandlers(self.max_handlers));
            }
            let id = handlers.next_id;
            handlers.next_id = id.checked_add(1).ok_or(ClientError::ResourceExhausted)?;
            handlers.of_mut(handler_type).insert(id, handler);
            (id, handlers.union(handler_type))
        };

        if let Err(e) = self.sender.request(&MmiMessage::AddInputHandler(request)).await {
            warn!(?handler_type, id, error = %e, "handler registration failed");
            self.lock().of_mut(handler_type).remove(&id);
            return Err(e);
        }
        debug!(?handler_type, id, event_types = request.event_types.0, "local handler added");
        Ok(id)
    }

    async fn remove(&self, handler_type: HandlerType, id: i32) -> Result<(), ClientError> {
        let _serial = self.updates.lock().await;
        let request = {
            let mut handlers = self.lock();
            if handlers.of_mut(handler_type).remove(&id).is_none() {
                return Err(ClientError::HandlerNotFound(id));
            }
            handlers.union(handler_type)
        };
        debug!(?handler_type, id, remaining = request.event_types.0, "local handler removed");
        self.sender.request(&MmiMessage::RemoveInputHandler(request)).await
    }

    fn matching(&self, handler_type: HandlerType, class: u32, tags: DeviceTags) -> Vec<Arc<dyn InputEventConsumer>> {
        let handlers = self.lock();
        let mut matched: Vec<(i32, i32, Arc<dyn InputEventConsumer>)> = handlers
            .of(handler_type)
            .iter()
            .filter(|(_, h)| h.event_types.contains(class) && h.device_tags.matches(tags))
            .map(|(id, h)| (h.priority, *id, Arc::clone(&h.consumer)))
            .collect();
        matched.sort_by_key(|(priority, id, _)| (*priority, *id));
        matched.into_iter().map(|(_, _, c)| c).collect()
    }
}

/// Monitor subsystem implied by an event-type mask.
fn monitor_id(event_types: EventTypeMask, raw: i32) -> MonitorId {
    if event_types.contains(EventTypeMask::TOUCH) {
        MonitorId::Touch(raw)
    } else if event_types.contains(EventTypeMask::POINTER) {
        MonitorId::Touchpad(raw)
    } else {
        MonitorId::Key(raw)
    }
}


#[cfg(test)]
mod tests {
    use mmi_core::SourceType;

    use super::test_support::RecordingConsumer;
    use super::*;
    use crate::application::sender::test_support::RecordingSender;

    fn registered(sender: &RecordingSender) -> Vec<(bool, InputHandlerRequest)> {
        sender
            .sent()
            .into_iter()
            .filter_map(|m| match m {
                MmiMessage::AddInputHandler(r) => Some((true, r)),
                MmiMessage::RemoveInputHandler(r) => Some((false, r)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_interceptors_register_their_union() {
        // Arrange
        let sender = Arc::new(RecordingSender::default());
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 8);
        let consumer = Arc::new(RecordingConsumer::default());

        // Act
        manager
            .add_interceptor(
                EventTypeMask(EventTypeMask::KEY),
                5,
                DeviceTags(DeviceTags::KEYBOARD),
                Arc::clone(&consumer) as Arc<dyn InputEventConsumer>,
            )
            .await
            .expect("first");
        manager
            .add_interceptor(
                EventTypeMask(EventTypeMask::TOUCH),
                2,
                DeviceTags(DeviceTags::TOUCH),
                Arc::clone(&consumer) as Arc<dyn InputEventConsumer>,
            )
            .await
            .expect("second");

        // Assert
        let sent = registered(&sender);
        assert_eq!(sent.len(), 2);
        let (is_add, last) = sent[1];
        assert!(is_add);
        assert_eq!(last.handler_type, HandlerType::Interceptor);
        assert_eq!(last.event_types.0, EventTypeMask::KEY | EventTypeMask::TOUCH);
        assert_eq!(last.device_tags.0, DeviceTags::KEYBOARD | DeviceTags::TOUCH);
        assert_eq!(last.priority, 2);
    }

    #[tokio::test]
    async fn test_removal_sends_remaining_union() {
        // Arrange
        let sender = Arc::new(RecordingSender::default());
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 8);
        let consumer: Arc<dyn InputEventConsumer> = Arc::new(RecordingConsumer::default());
        let key = manager
            .add_monitor(EventTypeMask(EventTypeMask::KEY), DeviceTags(DeviceTags::ALL), Arc::clone(&consumer))
            .await
            .expect("key monitor");
        let touch = manager
            .add_monitor(EventTypeMask(EventTypeMask::TOUCH), DeviceTags(DeviceTags::ALL), Arc::clone(&consumer))
            .await
            .expect("touch monitor");

        // Act
        manager.remove_monitor(key).await.expect("remove key");
        manager.remove_monitor(touch).await.expect("remove touch");

        // Assert
        let sent = registered(&sender);
        assert_eq!(sent[2], (false, InputHandlerRequest {
            handler_type: HandlerType::Monitor,
            event_types: EventTypeMask(EventTypeMask::TOUCH),
            priority: 0,
            device_tags: DeviceTags(DeviceTags::ALL),
        }));
        assert!(sent[3].1.event_types.is_empty());
        assert_eq!(manager.len(HandlerType::Monitor), 0);
    }

    #[tokio::test]
    async fn test_monitor_ids_carry_their_subsystem() {
        let sender = Arc::new(RecordingSender::default());
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 8);
        let consumer: Arc<dyn InputEventConsumer> = Arc::new(RecordingConsumer::default());

        let key = manager
            .add_monitor(EventTypeMask(EventTypeMask::KEY), DeviceTags(DeviceTags::ALL), Arc::clone(&consumer))
            .await
            .expect("key");
        let touchpad = manager
            .add_monitor(EventTypeMask(EventTypeMask::POINTER), DeviceTags(DeviceTags::ALL), Arc::clone(&consumer))
            .await
            .expect("touchpad");

        assert!(matches!(key, MonitorId::Key(_)));
        assert!(matches!(touchpad, MonitorId::Touchpad(_)));
        assert_ne!(key.raw(), touchpad.raw());
    }

    #[tokio::test]
    async fn test_rejected_registration_is_rolled_back() {
        // Arrange
        let sender = Arc::new(RecordingSender::default());
        sender.reply_with(-2);
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 8);

        // Act
        let result = manager
            .add_interceptor(
                EventTypeMask(EventTypeMask::KEY),
                0,
                DeviceTags(DeviceTags::ALL),
                Arc::new(RecordingConsumer::default()),
            )
            .await;

        // Assert
        assert!(matches!(result, Err(ClientError::Rejected { code: -2, .. })));
        assert_eq!(manager.len(HandlerType::Interceptor), 0);
    }

    #[tokio::test]
    async fn test_local_limit_and_unknown_id() {
        let sender = Arc::new(RecordingSender::default());
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 1);
        let consumer: Arc<dyn InputEventConsumer> = Arc::new(RecordingConsumer::default());
        let mask = EventTypeMask(EventTypeMask::KEY);
        let tags = DeviceTags(DeviceTags::ALL);

        manager.add_interceptor(mask, 0, tags, Arc::clone(&consumer)).await.expect("first");
        let second = manager.add_interceptor(mask, 0, tags, Arc::clone(&consumer)).await;
        let missing = manager.remove_interceptor(99).await;

        assert!(matches!(second, Err(ClientError::TooManyHandlers(1))));
        assert!(matches!(missing, Err(ClientError::HandlerNotFound(99))));
    }

    #[tokio::test]
    async fn test_reported_events_reach_matching_handlers_only() {
        // Arrange
        let sender = Arc::new(RecordingSender::default());
        let manager = InputHandlerManager::new(Arc::clone(&sender) as Arc<dyn MessageSender>, 8);
        let keys = Arc::new(RecordingConsumer::default());
        let touches = Arc::new(RecordingConsumer::default());
        manager
            .add_monitor(
                EventTypeMask(EventTypeMask::KEY),
                DeviceTags(DeviceTags::ALL),
                Arc::clone(&keys) as Arc<dyn InputEventConsumer>,
            )
            .await
            .expect("keys");
        manager
            .add_monitor(
                EventTypeMask(EventTypeMask::TOUCH),
                DeviceTags(DeviceTags::TOUCH),
                Arc::clone(&touches) as Arc<dyn InputEventConsumer>,
            )
            .await
            .expect("touches");

        // Act
        let key_count = manager.on_key_event(HandlerType::Monitor, &KeyEvent::new());
        let touch_count =
            manager.on_pointer_event(HandlerType::Monitor, &PointerEvent::new(SourceType::TouchScreen));
        let mouse_count = manager.on_pointer_event(HandlerType::Monitor, &PointerEvent::new(SourceType::Mouse));
        let intercepted = manager.on_key_event(HandlerType::Interceptor, &KeyEvent::new());

        // Assert
        assert_eq!((key_count, touch_count, mouse_count, intercepted), (1, 1, 0, 0));
        assert_eq!(keys.key_count(), 1);
        assert_eq!(touches.pointer_count(), 1);
        assert_eq!(keys.pointer_count(), 0);
    }
}
