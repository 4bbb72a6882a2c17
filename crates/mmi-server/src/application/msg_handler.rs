//! Request handling for connected clients.
//!
//! [`ServerMsgHandler`] is the [`PacketHandler`] the transport calls for
//! every decoded message after `Connect`.  Requests that change state are
//! answered with `RequestResult { code }`, `0` on success and the error's
//! negative [`RequestError::code`] otherwise.  Acknowledgements
//! (`MarkProcessed`, `MarkConsumed`) get no answer.

use std::sync::Arc;

use mmi_core::domain::HandlerType;
use mmi_core::{current_time_us, MessageId, MmiMessage};
use thiserror::Error;
use tracing::{debug, warn};

use super::anr::AnrManager;
use super::devices::DisplayState;
use super::handler::HandlerError;
use super::interceptor::InterceptorRegistry;
use super::key_subscriber::{KeySubscriberRegistry, SubscribeError};
use super::monitor::MonitorRegistry;
use super::pipeline::{InputPipeline, PipelineOutcome};
use super::session::{send_message, PacketHandler, SessionId, SessionTransmitter};
use super::standardized::StandardizedRegistry;

/// Error type for client requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
    #[error("injected event failed validation")]
    InvalidEvent,
    #[error("message id {0} is not a standardized event")]
    InvalidMessageId(i32),
    #[error("standardized event {message_id} is not registered for window {window_id}")]
    NotRegistered { window_id: i32, message_id: i32 },
    #[error("{0:?} is not accepted from clients")]
    Unexpected(MessageId),
}

impl RequestError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Handler(e) => e.code(),
            Self::Subscribe(e) => e.code(),
            Self::InvalidEvent => -10,
            Self::InvalidMessageId(_) => -11,
            Self::NotRegistered { .. } => -12,
            Self::Unexpected(_) => -13,
        }
    }
}

pub struct ServerMsgHandler {
    transmitter: Arc<dyn SessionTransmitter>,
    interceptors: Arc<InterceptorRegistry>,
    monitors: Arc<MonitorRegistry>,
    key_subscribers: Arc<KeySubscriberRegistry>,
    anr: Arc<AnrManager>,
    displays: Arc<DisplayState>,
    pipeline: Arc<InputPipeline>,
    standardized: Arc<StandardizedRegistry>,
}

impl ServerMsgHandler {
    pub fn new(
        transmitter: Arc<dyn SessionTransmitter>,
        interceptors: Arc<InterceptorRegistry>,
        monitors: Arc<MonitorRegistry>,
        key_subscribers: Arc<KeySubscriberRegistry>,
        anr: Arc<AnrManager>,
        displays: Arc<DisplayState>,
        pipeline: Arc<InputPipeline>,
        standardized: Arc<StandardizedRegistry>,
    ) -> Self {
        Self {
            transmitter,
            interceptors,
            monitors,
            key_subscribers,
            anr,
            displays,
            pipeline,
            standardized,
        }
    }

    /// Handles one request; `None` means no reply is due.
    pub fn handle(&self, session: SessionId, msg: MmiMessage) -> Option<Result<(), RequestError>> {
        let result = match msg {
            MmiMessage::AddInputHandler(req) => match req.handler_type {
                HandlerType::Interceptor => self.interceptors.add_interceptor(session, &req),
                HandlerType::Monitor => self.monitors.add_monitor(session, &req),
            }
            .map_err(RequestError::from),
            MmiMessage::RemoveInputHandler(req) => match req.handler_type {
                HandlerType::Interceptor => self.interceptors.remove_interceptor(session, &req),
                HandlerType::Monitor => self.monitors.remove_monitor(session, &req),
            }
            .map_err(RequestError::from),
            MmiMessage::MarkConsumed { event_id } => {
                self.monitors.mark_consumed(session, event_id);
                return None;
            }
            MmiMessage::MarkProcessed { anr_type, event_id } => {
                self.anr.mark_processed(session, anr_type, event_id);
                return None;
            }
            MmiMessage::SubscribeKeyEvent { subscribe_id, option } => self
                .key_subscribers
                .subscribe(session, subscribe_id, option)
                .map_err(RequestError::from),
            MmiMessage::UnsubscribeKeyEvent { subscribe_id } => self
                .key_subscribers
                .unsubscribe(session, subscribe_id)
                .map_err(RequestError::from),
            MmiMessage::InjectKeyEvent(mut event) => {
                event.action_time = current_time_us();
                self.check_injected(self.pipeline.handle_key_event(event))
            }
            MmiMessage::InjectPointerEvent(mut event) => {
                event.action_time = current_time_us();
                self.check_injected(self.pipeline.handle_pointer_event(event))
            }
            MmiMessage::UpdateDisplayInfo(info) => {
                self.displays.update(info);
                Ok(())
            }
            MmiMessage::RegisterStandardizedEvent { window_id, message_id } => {
                if self.standardized.register(session, window_id, message_id) {
                    Ok(())
                } else {
                    Err(RequestError::InvalidMessageId(message_id))
                }
            }
            MmiMessage::UnregisterStandardizedEvent { window_id, message_id } => {
                if self.standardized.unregister(session, window_id, message_id) {
                    Ok(())
                } else {
                    Err(RequestError::NotRegistered { window_id, message_id })
                }
            }
            other => Err(RequestError::Unexpected(other.message_id())),
        };
        Some(result)
    }

    /// Number of standardized-event registrations held for `session`.
    pub fn standardized_count(&self, session: SessionId) -> usize {
        self.standardized.count_for(session)
    }

    fn check_injected(&self, outcome: PipelineOutcome) -> Result<(), RequestError> {
        if outcome == PipelineOutcome::Invalid {
            return Err(RequestError::InvalidEvent);
        }
        Ok(())
    }

}

impl PacketHandler for ServerMsgHandler {
    fn on_packet(&self, session: SessionId, msg: MmiMessage) {
        let request = msg.message_id();
        let Some(result) = self.handle(session, msg) else {
            return;
        };
        let code = match result {
            Ok(()) => 0,
            Err(e) => {
                warn!(session, ?request, error = %e, "request rejected");
                e.code()
            }
        };
        let reply = MmiMessage::RequestResult { request, code };
        if !send_message(self.transmitter.as_ref(), session, &reply) {
            debug!(session, ?request, "reply not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use mmi_core::domain::{AnrEventType, DeviceTags, EventTypeMask, KeyOption, PointerItem};
    use mmi_core::protocol::InputHandlerRequest;
    use mmi_core::{DisplayGroupInfo, KeyCode, PointerAction, PointerEvent, SourceType};

    use super::*;
    use crate::application::anr::LoggingAnrObserver;
    use crate::application::session::SessionLostListener;
    use crate::application::pipeline::test_support::{fixture, Fixture};

    fn handler(f: &Fixture) -> (ServerMsgHandler, Arc<AnrManager>) {
        let anr = Arc::new(AnrManager::new(Duration::from_secs(5), Arc::new(LoggingAnrObserver)));
        let handler = ServerMsgHandler::new(
            Arc::clone(&f.tx) as Arc<dyn SessionTransmitter>,
            Arc::clone(&f.interceptors),
            Arc::clone(&f.monitors),
            Arc::clone(&f.subscribers),
            Arc::clone(&anr),
            Arc::clone(&f.displays),
            Arc::clone(&f.pipeline),
            Arc::clone(&f.standardized),
        );
        (handler, anr)
    }

    fn request(handler_type: HandlerType, event_types: u32) -> InputHandlerRequest {
        InputHandlerRequest {
            handler_type,
            event_types: EventTypeMask(event_types),
            priority: 10,
            device_tags: DeviceTags(DeviceTags::ALL),
        }
    }

    fn last_result(f: &Fixture, session: SessionId) -> Option<(MessageId, i32)> {
        f.tx.sent_to(session).into_iter().rev().find_map(|m| match m {
            MmiMessage::RequestResult { request, code } => Some((request, code)),
            _ => None,
        })
    }

    #[test]
    fn test_add_and_remove_handlers_reply_with_codes() {
        // Arrange
        let f = fixture();
        let (handler, _) = handler(&f);

        // Act
        handler.on_packet(2, MmiMessage::AddInputHandler(request(HandlerType::Interceptor, EventTypeMask::KEY)));
        let added = last_result(&f, 2);
        handler.on_packet(2, MmiMessage::AddInputHandler(request(HandlerType::Interceptor, 0)));
        let rejected = last_result(&f, 2);
        handler.on_packet(2, MmiMessage::RemoveInputHandler(request(HandlerType::Interceptor, 0)));

        // Assert
        assert_eq!(added, Some((MessageId::AddInputHandler, 0)));
        assert_eq!(
            rejected,
            Some((MessageId::AddInputHandler, HandlerError::InvalidHandler.code()))
        );
        assert!(f.interceptors.is_empty());
    }

    #[test]
    fn test_monitor_request_goes_to_monitor_registry() {
        let f = fixture();
        let (handler, _) = handler(&f);

        handler.on_packet(2, MmiMessage::AddInputHandler(request(HandlerType::Monitor, EventTypeMask::ALL)));

        assert_eq!(f.monitors.len(), 1);
        assert!(f.interceptors.is_empty());
    }

    #[test]
    fn test_acknowledgements_get_no_reply() {
        // Arrange
        let f = fixture();
        let (handler, anr) = handler(&f);
        anr.record(2, AnrEventType::Dispatch, 4, 0);

        // Act
        handler.on_packet(
            2,
            MmiMessage::MarkProcessed {
                anr_type: AnrEventType::Dispatch,
                event_id: 4,
            },
        );
        handler.on_packet(2, MmiMessage::MarkConsumed { event_id: 4 });

        // Assert
        assert_eq!(anr.pending_count(2, AnrEventType::Dispatch), 0);
        assert!(f.tx.sent_to(2).is_empty());
    }

    #[test]
    fn test_injected_pointer_event_is_dispatched() {
        // Arrange
        let f = fixture();
        let (handler, _) = handler(&f);
        let mut event = PointerEvent::new(SourceType::TouchScreen);
        event.pointer_id = 0;
        event.pointer_action = PointerAction::Down;
        event.add_pointer_item(PointerItem {
            display_x: 5,
            display_y: 5,
            pressed: true,
            ..PointerItem::new(0)
        });

        // Act
        handler.on_packet(2, MmiMessage::InjectPointerEvent(event));

        // Assert
        assert_eq!(last_result(&f, 2), Some((MessageId::InjectPointerEvent, 0)));
        assert!(matches!(
            f.tx.sent_to(1).as_slice(),
            [MmiMessage::OnPointerEvent(e)] if e.action_time > 0
        ));
    }

    #[test]
    fn test_invalid_injection_is_rejected() {
        let f = fixture();
        let (handler, _) = handler(&f);

        handler.on_packet(2, MmiMessage::InjectPointerEvent(PointerEvent::new(SourceType::Mouse)));

        assert_eq!(
            last_result(&f, 2),
            Some((MessageId::InjectPointerEvent, RequestError::InvalidEvent.code()))
        );
        assert!(f.tx.sent_to(1).is_empty());
    }

    #[test]
    fn test_key_subscription_round_trip() {
        let f = fixture();
        let (handler, _) = handler(&f);
        let option = KeyOption {
            pre_keys: BTreeSet::new(),
            final_key: KeyCode::A.code(),
            final_key_down: true,
        };

        handler.on_packet(2, MmiMessage::SubscribeKeyEvent { subscribe_id: 1, option: option.clone() });
        handler.on_packet(2, MmiMessage::SubscribeKeyEvent { subscribe_id: 1, option });
        let duplicate = last_result(&f, 2);
        handler.on_packet(2, MmiMessage::UnsubscribeKeyEvent { subscribe_id: 1 });

        assert_eq!(duplicate, Some((MessageId::SubscribeKeyEvent, SubscribeError::Duplicate(1).code())));
        assert_eq!(last_result(&f, 2), Some((MessageId::UnsubscribeKeyEvent, 0)));
        assert!(f.subscribers.is_empty());
    }

    #[test]
    fn test_display_update_replaces_state() {
        let f = fixture();
        let (handler, _) = handler(&f);

        handler.on_packet(1, MmiMessage::UpdateDisplayInfo(DisplayGroupInfo::default()));

        assert!(f.displays.snapshot().windows.is_empty());
        assert_eq!(last_result(&f, 1), Some((MessageId::UpdateDisplayInfo, 0)));
    }

    #[test]
    fn test_standardized_registrations_and_session_loss() {
        // Arrange
        let f = fixture();
        let (handler, _) = handler(&f);

        // Act
        handler.on_packet(2, MmiMessage::RegisterStandardizedEvent { window_id: 7, message_id: 1001 });
        handler.on_packet(2, MmiMessage::RegisterStandardizedEvent { window_id: 7, message_id: 0 });
        let invalid = last_result(&f, 2);
        handler.on_packet(2, MmiMessage::UnregisterStandardizedEvent { window_id: 8, message_id: 1001 });
        let missing = last_result(&f, 2);
        let before_loss = handler.standardized_count(2);
        f.standardized.on_session_lost(2);

        // Assert
        assert_eq!(invalid, Some((MessageId::RegisterStandardizedEvent, -11)));
        assert_eq!(missing, Some((MessageId::UnregisterStandardizedEvent, -12)));
        assert_eq!(before_loss, 1);
        assert_eq!(handler.standardized_count(2), 0);
    }

    #[test]
    fn test_service_messages_from_clients_are_rejected() {
        let f = fixture();
        let (handler, _) = handler(&f);

        handler.on_packet(2, MmiMessage::OnKeyEvent(mmi_core::KeyEvent::new()));

        assert_eq!(last_result(&f, 2), Some((MessageId::OnKeyEvent, -13)));
    }
}
