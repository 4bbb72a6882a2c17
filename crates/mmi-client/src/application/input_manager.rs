//! The client runtime's context object.
//!
//! [`InputManager`] owns every client-side manager and routes inbound
//! messages to them.  An application creates one per connection and passes
//! it where it is needed; nothing here is a process-wide singleton.
//!
//! Inbound routing:
//!
//! | Message                | Goes to                                   | ANR stream |
//! |------------------------|-------------------------------------------|------------|
//! | `OnKeyEvent`           | window consumer, standardized key handlers | dispatch  |
//! | `OnPointerEvent`       | window consumer, standardized touch handlers | dispatch |
//! | `ReportKeyEvent`       | local interceptors or monitors            | monitor (monitors only) |
//! | `ReportPointerEvent`   | local interceptors or monitors            | monitor (monitors only) |
//! | `OnSubscribeKeyEvent`  | key subscription callback                 | none       |
//! | `OnStandardizedEvent`  | standardized handlers of the category     | none       |

use std::sync::{Arc, PoisonError, RwLock};

use mmi_core::domain::{AnrEventType, HandlerType};
use mmi_core::{DisplayGroupInfo, KeyEvent, MmiMessage, PointerEvent, SourceType};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::anr_handler::AnrHandler;
use super::handler_manager::{InputEventConsumer, InputHandlerManager};
use super::key_subscription::KeySubscriptionManager;
use super::sender::{ClientError, MessageSender};
use super::standardized::{StandardizedEvent, StandardizedEventManager};
use crate::infrastructure::config::ClientConfig;

pub struct InputManager {
    sender: Arc<dyn MessageSender>,
    handlers: InputHandlerManager,
    key_subscriptions: KeySubscriptionManager,
    anr: Arc<AnrHandler>,
    standardized: StandardizedEventManager,
    window_consumer: RwLock<Option<Arc<dyn InputEventConsumer>>>,
}

impl InputManager {
    pub fn new(sender: Arc<dyn MessageSender>, config: &ClientConfig) -> Arc<Self> {
        Arc::new(Self {
            handlers: InputHandlerManager::new(Arc::clone(&sender), config.max_handlers_per_type),
            key_subscriptions: KeySubscriptionManager::new(Arc::clone(&sender)),
            anr: AnrHandler::new(Arc::clone(&sender), config.ui_timeout),
            standardized: StandardizedEventManager::new(Arc::clone(&sender)),
            window_consumer: RwLock::new(None),
            sender,
        })
    }

    pub fn handlers(&self) -> &InputHandlerManager {
        &self.handlers
    }

    pub fn key_subscriptions(&self) -> &KeySubscriptionManager {
        &self.key_subscriptions
    }

    pub fn anr(&self) -> &Arc<AnrHandler> {
        &self.anr
    }

    pub fn standardized(&self) -> &StandardizedEventManager {
        &self.standardized
    }

    /// Sets the consumer of events dispatched to this client's windows.
    pub fn set_window_consumer(&self, consumer: Arc<dyn InputEventConsumer>) {
        *self
            .window_consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(consumer);
    }

    // ── Requests ──────────────────────────────────────────────────────────────

    /// Tells the service a monitor fully handled the gesture `event_id`.
    pub async fn mark_consumed(&self, event_id: i32) -> Result<(), ClientError> {
        self.sender.send(&MmiMessage::MarkConsumed { event_id }).await
    }

    pub async fn inject_key_event(&self, event: KeyEvent) -> Result<(), ClientError> {
        self.sender.request(&MmiMessage::InjectKeyEvent(event)).await
    }

    pub async fn inject_pointer_event(&self, event: PointerEvent) -> Result<(), ClientError> {
        self.sender.request(&MmiMessage::InjectPointerEvent(event)).await
    }

    /// Replaces the service's window and display layout.
    pub async fn update_display_info(&self, info: DisplayGroupInfo) -> Result<(), ClientError> {
        self.sender.request(&MmiMessage::UpdateDisplayInfo(info)).await
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Routes inbound messages until the connection closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<MmiMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle_message(msg);
        }
        info!("message stream ended");
    }

    pub fn handle_message(&self, msg: MmiMessage) {
        match msg {
            MmiMessage::OnKeyEvent(event) => {
                trace!(event_id = event.id, "key event dispatched to window");
                if let Some(consumer) = self.window_consumer() {
                    consumer.on_key_event(&event);
                }
                self.standardized.on_key(&event);
                self.anr
                    .update_last_event_id(AnrEventType::Dispatch, event.id, event.action_time);
            }
            MmiMessage::OnPointerEvent(event) => {
                trace!(event_id = event.id, "pointer event dispatched to window");
                if let Some(consumer) = self.window_consumer() {
                    consumer.on_pointer_event(&event);
                }
                if event.source_type == SourceType::TouchScreen {
                    self.standardized.on_touch(&event);
                }
                self.anr
                    .update_last_event_id(AnrEventType::Dispatch, event.id, event.action_time);
            }
            MmiMessage::ReportKeyEvent { handler_type, event } => {
                self.handlers.on_key_event(handler_type, &event);
                if handler_type == HandlerType::Monitor {
                    self.anr
                        .update_last_event_id(AnrEventType::Monitor, event.id, event.action_time);
                }
            }
            MmiMessage::ReportPointerEvent { handler_type, event } => {
                self.handlers.on_pointer_event(handler_type, &event);
                if handler_type == HandlerType::Monitor {
                    self.anr
                        .update_last_event_id(AnrEventType::Monitor, event.id, event.action_time);
                }
            }
            MmiMessage::OnSubscribeKeyEvent { subscribe_id, event } => {
                self.key_subscriptions.on_subscribe_key_event(subscribe_id, &event);
            }
            MmiMessage::OnStandardizedEvent {
                window_id,
                message_id,
                device_id,
            } => match StandardizedEvent::from_message(message_id, device_id) {
                Some(event) => {
                    let handled = self.standardized.dispatch(event);
                    trace!(window_id, message_id, handled, "standardized event delivered");
                }
                None => warn!(window_id, message_id, "unknown standardized event"),
            },
            MmiMessage::RequestResult { request, code } => {
                debug!(?request, code, "reply with no waiting request");
            }
            other => warn!(msg_id = ?other.message_id(), "unexpected message from service"),
        }
    }

    fn window_consumer(&self) -> Option<Arc<dyn InputEventConsumer>> {
        self.window_consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
